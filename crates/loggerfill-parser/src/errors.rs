use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("header row {row_index} malformed: {message}")]
    MalformedHeader { row_index: usize, message: String },

    #[error("timestamp column '{expected}' not found in header row 3 (columns: {found:?})")]
    MissingTimestampColumn { expected: String, found: Vec<String> },

    #[error("data row {line_index} invalid: {message}")]
    BodyParse { line_index: usize, message: String },

    #[error("CSV error: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("failed to build body table: {message}")]
    Table { message: String },
}

impl ParserError {
    /// True for failures in the header block, false for anything in the body.
    pub fn is_header_error(&self) -> bool {
        matches!(self, ParserError::MalformedHeader { .. })
    }
}

impl From<csv::Error> for ParserError {
    fn from(source: csv::Error) -> Self {
        ParserError::Csv { source }
    }
}
