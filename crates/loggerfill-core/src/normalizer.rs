use std::fmt::Write as _;

use chrono::DateTime;
use loggerfill_parser::{
    parse_logger_file, DeviceId, HeaderBlock, LoggerTable, ParseOptions, ParserError,
    DEFAULT_TIMESTAMP_COLUMN,
};
use polars::lazy::dsl::*;
use polars::prelude::*;
use thiserror::Error;

use crate::time_axis::{AxisError, TimeAxis};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Axis(#[from] AxisError),
    #[error("reindexed body has {found} rows, expected {expected}")]
    Layout { expected: usize, found: usize },
    #[error("output timestamp format '{0}' is invalid")]
    TimestampFormat(String),
}

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub timestamp_column: String,
    pub sentinel: String,
    pub missing_marker: String,
    pub record_unit: String,
    pub output_timestamp_format: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
            sentinel: "***".to_string(),
            missing_marker: String::new(),
            record_unit: "records".to_string(),
            output_timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

/// A device's rewritten header block followed by its reindexed body, as rows
/// of text cells in output order.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub device_id: DeviceId,
    pub rows: Vec<Vec<String>>,
    pub duplicate_lines: Vec<usize>,
}

impl NormalizedTable {
    pub fn header_rows(&self) -> &[Vec<String>] {
        &self.rows[..loggerfill_parser::HEADER_ROWS]
    }

    pub fn body_rows(&self) -> &[Vec<String>] {
        &self.rows[loggerfill_parser::HEADER_ROWS..]
    }
}

/// Parses one raw logger export and aligns it to `axis`.
pub fn normalize(
    content: &str,
    axis: &TimeAxis,
    options: &NormalizeOptions,
) -> Result<NormalizedTable, NormalizeError> {
    let parse_options = ParseOptions {
        timestamp_column: options.timestamp_column.clone(),
    };
    let table = parse_logger_file(content, &parse_options)?;
    normalize_table(table, axis, options)
}

pub fn normalize_table(
    table: LoggerTable,
    axis: &TimeAxis,
    options: &NormalizeOptions,
) -> Result<NormalizedTable, NormalizeError> {
    let channels: Vec<&str> = table.channel_columns().collect();

    let joined = reindex(&table.body, &table.timestamp_column, axis)?;
    let cleaned = replace_sentinel(joined, &channels, &options.sentinel)?;
    if cleaned.height() != axis.len() {
        return Err(NormalizeError::Layout {
            expected: axis.len(),
            found: cleaned.height(),
        });
    }

    let header = table
        .header
        .rewritten(&table.device_id, axis.len(), &options.record_unit);
    let rows = assemble_rows(
        &header,
        &cleaned,
        &table.column_names,
        &table.timestamp_column,
        options,
    )?;

    Ok(NormalizedTable {
        device_id: table.device_id,
        rows,
        duplicate_lines: table.duplicate_lines,
    })
}

/// Left-joins the axis against `body` on `key`: one output row per axis
/// timestamp, in axis order. Body rows off the axis are dropped.
pub fn reindex(body: &DataFrame, key: &str, axis: &TimeAxis) -> Result<DataFrame, NormalizeError> {
    let grid = axis.to_frame(key)?;
    let joined = grid
        .lazy()
        .join(
            body.clone().lazy(),
            [col(key)],
            [col(key)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([key], SortMultipleOptions::default())
        .collect()?;
    Ok(joined)
}

/// Nulls out every cell in `channels` that equals `sentinel` exactly.
pub fn replace_sentinel(
    df: DataFrame,
    channels: &[&str],
    sentinel: &str,
) -> Result<DataFrame, NormalizeError> {
    if channels.is_empty() {
        return Ok(df);
    }

    let exprs: Vec<Expr> = channels
        .iter()
        .map(|name| {
            when(col(*name).eq(lit(sentinel)))
                .then(lit(NULL).cast(DataType::String))
                .otherwise(col(*name))
                .alias(*name)
        })
        .collect();

    Ok(df.lazy().with_columns(exprs).collect()?)
}

fn assemble_rows(
    header: &HeaderBlock,
    body: &DataFrame,
    column_names: &[String],
    key: &str,
    options: &NormalizeOptions,
) -> Result<Vec<Vec<String>>, NormalizeError> {
    let height = body.height();
    let mut body_rows: Vec<Vec<String>> = vec![Vec::with_capacity(column_names.len()); height];

    for name in column_names {
        let column = body.column(name)?;
        if name == key {
            let values = column.datetime()?;
            for (idx, row) in body_rows.iter_mut().enumerate() {
                let cell = match values.get(idx) {
                    Some(micros) => format_timestamp(micros, &options.output_timestamp_format)?,
                    None => options.missing_marker.clone(),
                };
                row.push(cell);
            }
        } else {
            let values = column.str()?;
            for (idx, row) in body_rows.iter_mut().enumerate() {
                let cell = values
                    .get(idx)
                    .map(str::to_string)
                    .unwrap_or_else(|| options.missing_marker.clone());
                row.push(cell);
            }
        }
    }

    let mut rows: Vec<Vec<String>> = header.rows().iter().map(|row| row.to_vec()).collect();
    rows.extend(body_rows);

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }

    Ok(rows)
}

fn format_timestamp(micros: i64, format: &str) -> Result<String, NormalizeError> {
    let dt = DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| NormalizeError::TimestampFormat(format.to_string()))?;
    let mut out = String::new();
    write!(out, "{}", dt.naive_utc().format(format))
        .map_err(|_| NormalizeError::TimestampFormat(format.to_string()))?;
    Ok(out)
}
