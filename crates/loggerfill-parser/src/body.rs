use std::collections::HashSet;

use csv::StringRecord;
use polars::prelude::*;

use crate::common::{is_blank_record, parse_timestamp, timestamp_micros};
use crate::errors::ParserError;

/// Column-wise accumulator for the observation rows below the header block.
pub(crate) struct BodyBuilder {
    column_names: Vec<String>,
    timestamp_index: usize,
    timestamps: Vec<i64>,
    values: Vec<Vec<Option<String>>>,
    seen: HashSet<i64>,
    duplicate_lines: Vec<usize>,
}

impl BodyBuilder {
    pub fn new(column_names: Vec<String>, timestamp_index: usize) -> Self {
        let values = vec![Vec::new(); column_names.len()];
        Self {
            column_names,
            timestamp_index,
            timestamps: Vec::new(),
            values,
            seen: HashSet::new(),
            duplicate_lines: Vec::new(),
        }
    }

    pub fn push_record(
        &mut self,
        record: &StringRecord,
        line_index: usize,
    ) -> Result<(), ParserError> {
        if is_blank_record(record) {
            return Ok(());
        }

        let width = self.column_names.len();
        if record.len() > width && record.iter().skip(width).any(|cell| !cell.trim().is_empty()) {
            return Err(ParserError::BodyParse {
                line_index,
                message: format!("expected {width} columns but found {}", record.len()),
            });
        }

        let raw_timestamp = record.get(self.timestamp_index).unwrap_or("").trim();
        if raw_timestamp.is_empty() {
            return Err(ParserError::BodyParse {
                line_index,
                message: format!(
                    "column '{}' is empty",
                    self.column_names[self.timestamp_index]
                ),
            });
        }
        let timestamp = parse_timestamp(raw_timestamp)
            .map_err(|message| ParserError::BodyParse { line_index, message })?;
        let micros = timestamp_micros(timestamp);

        // first row for a timestamp wins
        if !self.seen.insert(micros) {
            self.duplicate_lines.push(line_index);
            return Ok(());
        }

        self.timestamps.push(micros);
        for (idx, column) in self.values.iter_mut().enumerate() {
            if idx == self.timestamp_index {
                continue;
            }
            let cell = record.get(idx).unwrap_or("");
            column.push((!cell.trim().is_empty()).then(|| cell.to_string()));
        }

        Ok(())
    }

    pub fn finish(self) -> Result<(DataFrame, Vec<usize>), ParserError> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.column_names.len());

        for (idx, (name, values)) in self.column_names.iter().zip(self.values).enumerate() {
            if idx == self.timestamp_index {
                let series = Series::new(name.as_str().into(), self.timestamps.clone())
                    .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
                    .map_err(|err| ParserError::Table {
                        message: format!("failed to cast timestamp column: {err}"),
                    })?;
                columns.push(series.into());
            } else {
                columns.push(Series::new(name.as_str().into(), values).into());
            }
        }

        let df = DataFrame::new(columns).map_err(|err| ParserError::Table {
            message: err.to_string(),
        })?;

        Ok((df, self.duplicate_lines))
    }
}
