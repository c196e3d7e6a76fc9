mod body;
mod common;
pub mod errors;
mod header;
pub mod model;
mod reader;

pub use common::{disambiguate_columns, parse_timestamp};
pub use errors::ParserError;
pub use header::{derive_device_id, HEADER_ROWS};
pub use model::{DeviceId, HeaderBlock, LoggerTable};
pub use reader::{parse_logger_file, ParseOptions, DEFAULT_TIMESTAMP_COLUMN};
