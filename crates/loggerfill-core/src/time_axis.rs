use chrono::{Duration, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AxisError {
    #[error("study window start {start} is after end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("sampling interval must be positive, got {0}")]
    InvalidInterval(Duration),
    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

/// Evenly spaced, strictly increasing timestamps covering the study window.
///
/// Built once per run and shared read-only by every file normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAxis {
    timestamps: Vec<NaiveDateTime>,
    interval: Duration,
}

impl TimeAxis {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn first(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.timestamps.iter().copied()
    }

    pub fn as_slice(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// One-column frame of `Datetime(Microseconds)` values, the left side of
    /// the reindexing join.
    pub fn to_frame(&self, column: &str) -> Result<DataFrame, AxisError> {
        let micros: Vec<i64> = self
            .timestamps
            .iter()
            .map(|ts| ts.and_utc().timestamp_micros())
            .collect();
        let series = Series::new(column.into(), micros)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
        Ok(DataFrame::new(vec![series.into()])?)
    }
}

/// Returns `start + k * interval` for every `k >= 0` that stays `<= end`.
pub fn build_time_axis(
    start: NaiveDateTime,
    end: NaiveDateTime,
    interval: Duration,
) -> Result<TimeAxis, AxisError> {
    if interval <= Duration::zero() {
        return Err(AxisError::InvalidInterval(interval));
    }
    if start > end {
        return Err(AxisError::InvalidRange { start, end });
    }

    let span_micros = (end - start).num_microseconds();
    let step_micros = interval.num_microseconds();
    let capacity = match (span_micros, step_micros) {
        (Some(span), Some(step)) if step > 0 => (span / step) as usize + 1,
        _ => 1,
    };

    let mut timestamps = Vec::with_capacity(capacity);
    let mut current = start;
    loop {
        timestamps.push(current);
        // an overflowing step is necessarily past `end`
        match current.checked_add_signed(interval) {
            Some(next) if next <= end => current = next,
            _ => break,
        }
    }

    Ok(TimeAxis {
        timestamps,
        interval,
    })
}
