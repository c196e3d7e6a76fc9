use std::collections::HashSet;

use chrono::NaiveDateTime;

static TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

/// Parses a logger or configuration timestamp in any of the accepted layouts.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, String> {
    let trimmed = value.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }
    Err(format!("invalid timestamp '{trimmed}'"))
}

pub(crate) fn timestamp_micros(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

/// Makes column names unique in order of appearance: a repeated `Temp`
/// becomes `Temp.1`, `Temp.2`, and blank names become `Unnamed: <index>`.
pub fn disambiguate_columns<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    let mut result = Vec::with_capacity(names.len());

    for (idx, raw) in names.iter().enumerate() {
        let trimmed = raw.as_ref().trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            trimmed.to_string()
        };

        let mut candidate = base.clone();
        let mut suffix = 1usize;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }

        seen.insert(candidate.clone());
        result.push(candidate);
    }

    result
}

pub(crate) fn is_blank_record(record: &csv::StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}
