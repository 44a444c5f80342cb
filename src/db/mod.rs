use async_trait::async_trait;
use chrono::{Duration, Utc};

pub mod models;
pub mod postgres;
pub mod quality;

pub use postgres::PostgresClient;

use crate::db::models::{Location, NewRawResponse, Observation};
use crate::error::{PipelineError, PipelineResult};
use crate::normalize;

/// Persistence contract the pipeline runs against.
///
/// `PostgresClient` is the production implementation; pipeline tests use
/// an in-memory fake. Each operation is one connect-act-commit unit, and
/// no transaction ever spans two of them: a failed call is retried (or
/// not) by whoever scheduled the run.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Active locations, ordered by location id.
    async fn list_active_locations(&self) -> PipelineResult<Vec<Location>>;

    /// Append one raw API response; returns the generated ingestion id.
    async fn insert_raw_response(&self, new: &NewRawResponse) -> PipelineResult<i64>;

    /// Re-read the raw row by id, normalize it, and upsert the curated
    /// observation. Returns the affected row count.
    async fn upsert_curated(&self, ingestion_id: i64) -> PipelineResult<u64>;

    /// Rebuild the latest-observation-per-location table.
    async fn refresh_latest_snapshot(&self) -> PipelineResult<()>;

    /// Assert snapshot completeness and observation freshness against the
    /// currently persisted state.
    async fn check_data_quality(
        &self,
        expected_locations: i64,
        max_lag: Duration,
    ) -> PipelineResult<()>;
}

#[async_trait]
impl Repository for PostgresClient {
    async fn list_active_locations(&self) -> PipelineResult<Vec<Location>> {
        Ok(PostgresClient::list_active_locations(self).await?)
    }

    async fn insert_raw_response(&self, new: &NewRawResponse) -> PipelineResult<i64> {
        Ok(PostgresClient::insert_raw_response(self, new).await?)
    }

    async fn upsert_curated(&self, ingestion_id: i64) -> PipelineResult<u64> {
        let raw = self
            .get_raw_response(ingestion_id)
            .await?
            .ok_or(PipelineError::RawResponseMissing(ingestion_id))?;

        let fields = normalize::normalize(&raw.payload)?;
        let observation = Observation::from_raw(&raw, fields);

        Ok(self.upsert_observation(&observation).await?)
    }

    async fn refresh_latest_snapshot(&self) -> PipelineResult<()> {
        Ok(PostgresClient::refresh_latest_snapshot(self).await?)
    }

    async fn check_data_quality(
        &self,
        expected_locations: i64,
        max_lag: Duration,
    ) -> PipelineResult<()> {
        let stats = self.snapshot_stats().await?;
        quality::evaluate(&stats, expected_locations, max_lag, Utc::now())?;
        Ok(())
    }
}
