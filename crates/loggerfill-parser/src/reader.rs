use crate::body::BodyBuilder;
use crate::common::disambiguate_columns;
use crate::errors::ParserError;
use crate::header::{derive_device_id, read_header_block, HEADER_ROWS};
use crate::model::LoggerTable;

pub const DEFAULT_TIMESTAMP_COLUMN: &str = "Measurement Time";

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Name of the join-key column in header row 3, compared case-insensitively.
    pub timestamp_column: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
        }
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(false).flexible(true);
    builder
}

/// Parses the delimited-text export of one logger sheet.
///
/// The header block is read first and checked on its own, so a file with a
/// broken label is reported as a header failure even when its body would not
/// parse either.
pub fn parse_logger_file(content: &str, options: &ParseOptions) -> Result<LoggerTable, ParserError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = reader_builder().from_reader(content.as_bytes());
    let mut records = reader.records();

    let header = read_header_block(&mut records)?;
    let device_id = derive_device_id(&header)?;

    let column_names = disambiguate_columns(header.channel_names());
    let wanted = options.timestamp_column.trim();
    let timestamp_index = header
        .channel_names()
        .iter()
        .position(|name| name.trim().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| ParserError::MissingTimestampColumn {
            expected: wanted.to_string(),
            found: column_names.clone(),
        })?;
    let timestamp_column = column_names[timestamp_index].clone();

    let mut builder = BodyBuilder::new(column_names.clone(), timestamp_index);
    for (row_idx, record) in records.enumerate() {
        let record = record?;
        let line_index = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(row_idx + HEADER_ROWS + 1);
        builder.push_record(&record, line_index)?;
    }
    let (body, duplicate_lines) = builder.finish()?;

    Ok(LoggerTable {
        header,
        device_id,
        column_names,
        timestamp_column,
        body,
        duplicate_lines,
    })
}
