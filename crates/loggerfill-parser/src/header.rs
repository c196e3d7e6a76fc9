use csv::StringRecord;

use crate::errors::ParserError;
use crate::model::{DeviceId, HeaderBlock};

pub const HEADER_ROWS: usize = 3;

/// Pulls the three metadata rows off the front of a record stream.
pub(crate) fn read_header_block<I>(records: &mut I) -> Result<HeaderBlock, ParserError>
where
    I: Iterator<Item = Result<StringRecord, csv::Error>>,
{
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(HEADER_ROWS);

    for row_index in 1..=HEADER_ROWS {
        let record = records
            .next()
            .ok_or_else(|| ParserError::MalformedHeader {
                row_index,
                message: format!("file ended before header row {row_index}"),
            })?
            .map_err(|err| ParserError::MalformedHeader {
                row_index,
                message: err.to_string(),
            })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let column_row = rows.pop().unwrap_or_default();
    let count_row = rows.pop().unwrap_or_default();
    let label_row = rows.pop().unwrap_or_default();

    Ok(HeaderBlock::new(label_row, count_row, column_row))
}

pub fn derive_device_id(header: &HeaderBlock) -> Result<DeviceId, ParserError> {
    let label = header
        .label()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .ok_or_else(|| ParserError::MalformedHeader {
            row_index: 1,
            message: "label cell is empty".to_string(),
        })?;

    DeviceId::from_label(label).map_err(|message| ParserError::MalformedHeader {
        row_index: 1,
        message: format!("label '{label}': {message}"),
    })
}
