pub mod batch;
pub mod config;
pub mod normalizer;
pub mod output;
pub mod time_axis;

pub use batch::{run, BatchSummary, FileError, FileReport, FileStatus, RunError};
pub use config::{Config, ConfigError, Frequency};
pub use normalizer::{normalize, NormalizeError, NormalizeOptions, NormalizedTable};
pub use output::{prepare_directory, OutputStager};
pub use time_axis::{build_time_axis, AxisError, TimeAxis};
