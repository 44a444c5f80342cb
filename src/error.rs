//! Typed failures for the ingestion pipeline.
//!
//! Each stage raises its own error type; `PipelineError` is the umbrella a
//! per-location chain or the data-quality gate reports to the run.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Transport-level fetch failure. HTTP error *statuses* are not errors at
/// this layer: the fetcher returns them normally with whatever body the
/// server sent, so diagnostics end up in the raw table.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed after {attempts} attempts: {reason}")]
    Exhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("response from {url} (status {status}) is not valid JSON: {reason}")]
    InvalidBody {
        url: String,
        status: u16,
        reason: String,
    },
}

/// Normalization failure. The observation timestamp is the only mandatory
/// payload field; everything else degrades to NULL.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("payload has no numeric \"dt\" observation timestamp")]
    MissingObservedAt,
}

/// Post-run data-quality gate failure. A reporting gate, not a rollback:
/// all writes made before the check stay committed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DataQualityError {
    #[error("latest snapshot has {actual} rows, expected at least {expected}")]
    RowCount { actual: i64, expected: i64 },

    #[error("no curated observations exist")]
    NoObservations,

    #[error("data is stale: newest observation {observed_at} lags by {lag_minutes} minutes (max {max_lag_minutes})")]
    Stale {
        observed_at: DateTime<Utc>,
        lag_minutes: i64,
        max_lag_minutes: i64,
    },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// The raw row written moments earlier is gone. A concurrent cleanup
    /// eating it is a bug state, not an expected condition.
    #[error("raw response {0} not found")]
    RawResponseMissing(i64),

    #[error(transparent)]
    DataQuality(#[from] DataQualityError),

    #[error("repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
