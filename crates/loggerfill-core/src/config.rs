use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use loggerfill_parser::{parse_timestamp, DEFAULT_TIMESTAMP_COLUMN};
use serde::Deserialize;
use thiserror::Error;

use crate::normalizer::NormalizeOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config field '{field}': {message}")]
    Timestamp { field: &'static str, message: String },
    #[error("unrecognized frequency '{0}' (expected e.g. H, 15min, 2D, hourly)")]
    Frequency(String),
}

/// Fixed sampling interval parsed from a pandas-style frequency token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency(Duration);

impl Frequency {
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        let trimmed = token.trim();
        let unknown = || ConfigError::Frequency(trimmed.to_string());

        let word = match trimmed.to_ascii_lowercase().as_str() {
            "secondly" => Some(Duration::seconds(1)),
            "minutely" => Some(Duration::minutes(1)),
            "hourly" => Some(Duration::hours(1)),
            "daily" => Some(Duration::days(1)),
            "weekly" => Some(Duration::weeks(1)),
            _ => None,
        };
        if let Some(interval) = word {
            return Ok(Self(interval));
        }

        let unit_start = trimmed
            .char_indices()
            .find(|(idx, ch)| !(ch.is_ascii_digit() || (*idx == 0 && matches!(ch, '-' | '+'))))
            .map(|(idx, _)| idx)
            .ok_or_else(unknown)?;
        let (count, unit) = trimmed.split_at(unit_start);
        let count: i64 = match count {
            "" => 1,
            digits => digits.parse().map_err(|_| unknown())?,
        };

        let interval = match unit {
            "S" | "s" | "sec" => Duration::try_seconds(count),
            "T" | "min" => Duration::try_minutes(count),
            "H" | "h" => Duration::try_hours(count),
            "D" | "d" => Duration::try_days(count),
            "W" | "w" => Duration::try_weeks(count),
            _ => None,
        }
        .ok_or_else(unknown)?;

        Ok(Self(interval))
    }

    pub fn interval(&self) -> Duration {
        self.0
    }
}

fn default_frequency() -> String {
    "H".to_string()
}

fn default_input_pattern() -> String {
    "*.csv".to_string()
}

fn default_timestamp_column() -> String {
    DEFAULT_TIMESTAMP_COLUMN.to_string()
}

fn default_sentinel() -> String {
    "***".to_string()
}

fn default_record_unit() -> String {
    "records".to_string()
}

fn default_output_suffix() -> String {
    "_gap-filled-sensor-data.csv".to_string()
}

fn default_output_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

/// Run configuration as written in `loggerfill.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub start: String,
    pub end: String,
    #[serde(default = "default_frequency")]
    pub frequency: String,
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub intermediate_directory: PathBuf,
    #[serde(default = "default_input_pattern")]
    pub input_pattern: String,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    #[serde(default)]
    pub missing_marker: String,
    #[serde(default = "default_record_unit")]
    pub record_unit: String,
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
    #[serde(default = "default_output_timestamp_format")]
    pub output_timestamp_format: String,
}

impl Config {
    /// Loads a TOML config. Relative directories are resolved against the
    /// directory holding the config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn resolve_relative_to(&mut self, base: &Path) {
        for dir in [
            &mut self.input_directory,
            &mut self.output_directory,
            &mut self.intermediate_directory,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    pub fn start(&self) -> Result<NaiveDateTime, ConfigError> {
        parse_timestamp(&self.start).map_err(|message| ConfigError::Timestamp {
            field: "start",
            message,
        })
    }

    pub fn end(&self) -> Result<NaiveDateTime, ConfigError> {
        parse_timestamp(&self.end).map_err(|message| ConfigError::Timestamp {
            field: "end",
            message,
        })
    }

    pub fn frequency(&self) -> Result<Frequency, ConfigError> {
        Frequency::parse(&self.frequency)
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            timestamp_column: self.timestamp_column.clone(),
            sentinel: self.sentinel.clone(),
            missing_marker: self.missing_marker.clone(),
            record_unit: self.record_unit.clone(),
            output_timestamp_format: self.output_timestamp_format.clone(),
        }
    }
}
