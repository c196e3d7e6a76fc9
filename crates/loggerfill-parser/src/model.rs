use std::fmt;

use polars::prelude::DataFrame;

/// Short token naming a single logger, e.g. `D3Y` for a sheet labelled
/// `D3Y-12Feb2018-0914.xls`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Derives the identifier from a raw sheet label: everything before the
    /// first `.`, then everything before the first `-`.
    pub fn from_label(label: &str) -> Result<Self, String> {
        let without_extension = label.trim().split('.').next().unwrap_or_default();
        let id = without_extension.split('-').next().unwrap_or_default().trim();
        Self::try_from(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for DeviceId {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("device identifier is empty".to_string());
        }
        if trimmed.contains(['/', '\\']) || trimmed == ".." {
            return Err(format!(
                "device identifier '{trimmed}' cannot be used as a file name"
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// The three metadata rows that sit above the body of a logger export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    pub label_row: Vec<String>,
    pub count_row: Vec<String>,
    pub column_row: Vec<String>,
}

impl HeaderBlock {
    pub fn new(label_row: Vec<String>, count_row: Vec<String>, column_row: Vec<String>) -> Self {
        Self {
            label_row,
            count_row,
            column_row,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label_row.first().map(String::as_str)
    }

    pub fn record_count(&self) -> Option<&str> {
        self.count_row.first().map(String::as_str)
    }

    pub fn channel_names(&self) -> &[String] {
        &self.column_row
    }

    /// Returns a copy with the device id in the label cell and a fresh record
    /// count. The column row is left untouched.
    pub fn rewritten(&self, device_id: &DeviceId, records: usize, unit: &str) -> Self {
        let mut label_row = self.label_row.clone();
        set_first(&mut label_row, device_id.to_string());

        let mut count_row = self.count_row.clone();
        set_first(&mut count_row, format!("{records} {unit}"));

        Self {
            label_row,
            count_row,
            column_row: self.column_row.clone(),
        }
    }

    pub fn rows(&self) -> [&[String]; 3] {
        [&self.label_row, &self.count_row, &self.column_row]
    }
}

fn set_first(row: &mut Vec<String>, value: String) {
    match row.first_mut() {
        Some(cell) => *cell = value,
        None => row.push(value),
    }
}

/// One parsed logger export.
///
/// `body` holds the timestamp column as `Datetime(Microseconds)` and every
/// other column as nullable strings, named after `column_names`. Rows that
/// repeated an earlier timestamp were dropped; their file line numbers are kept
/// in `duplicate_lines`.
#[derive(Debug, Clone)]
pub struct LoggerTable {
    pub header: HeaderBlock,
    pub device_id: DeviceId,
    pub column_names: Vec<String>,
    pub timestamp_column: String,
    pub body: DataFrame,
    pub duplicate_lines: Vec<usize>,
}

impl LoggerTable {
    pub fn channel_columns(&self) -> impl Iterator<Item = &str> {
        self.column_names
            .iter()
            .map(String::as_str)
            .filter(move |name| *name != self.timestamp_column)
    }
}
