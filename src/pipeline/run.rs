//! One scheduled run of the ingestion pipeline.
//!
//! The contract an external scheduler gets: list the active locations
//! once, run one independent fetch/append-raw/upsert-curated chain per
//! location, and only after every chain has finished gate the run on
//! data quality and rebuild the latest snapshot. Chains never abort each
//! other; a failed chain is reported, not masked. A fetch that obtained
//! an HTTP error response still appends its raw row and then fails at
//! normalization, which keeps the error body on record.

use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use log::{error, info};

use crate::config::{ApiSettings, PipelineSettings};
use crate::db::models::{Location, NewRawResponse};
use crate::db::Repository;
use crate::error::{PipelineError, PipelineResult};
use crate::fetch::Fetcher;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub endpoint: String,
    pub max_lag: Duration,
    /// When true (the historically documented behavior), the data-quality
    /// gate reads the latest snapshot as the *previous* run left it; when
    /// false it validates the snapshot this run is about to publish.
    pub check_before_refresh: bool,
}

impl RunOptions {
    pub fn from_settings(api: &ApiSettings, pipeline: &PipelineSettings) -> Self {
        Self {
            endpoint: api.endpoint.clone(),
            max_lag: Duration::minutes(pipeline.max_lag_minutes),
            check_before_refresh: pipeline.check_before_refresh,
        }
    }
}

/// One location's chain, completed.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub location_id: i64,
    pub location_key: String,
    pub ingestion_id: i64,
    pub http_status: u16,
    pub rows_affected: u64,
}

/// One location's chain, failed. Raw rows written before the failure stay
/// committed.
#[derive(Debug)]
pub struct ChainFailure {
    pub location_id: i64,
    pub location_key: String,
    pub error: PipelineError,
}

#[derive(Debug)]
pub struct RunReport {
    pub locations: usize,
    pub ingested: Vec<ChainOutcome>,
    pub failures: Vec<ChainFailure>,
    pub data_quality: Result<(), PipelineError>,
}

impl RunReport {
    /// The run succeeds only when every chain completed and the
    /// data-quality gate passed.
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty() && self.data_quality.is_ok()
    }
}

async fn ingest_location<R: Repository, F: Fetcher>(
    repo: &R,
    fetcher: &F,
    endpoint: &str,
    location: &Location,
) -> PipelineResult<ChainOutcome> {
    let outcome = fetcher.fetch_current(location.lat, location.lon).await?;

    let new = NewRawResponse {
        endpoint: endpoint.to_string(),
        location_id: location.location_id,
        location_key: location.location_key.clone(),
        request_params: serde_json::to_value(&outcome.request_params)
            .map_err(anyhow::Error::from)?,
        http_status: outcome.http_status as i32,
        data_timestamp: outcome.data_timestamp,
        payload: outcome.payload,
    };

    let ingestion_id = repo.insert_raw_response(&new).await?;
    let rows_affected = repo.upsert_curated(ingestion_id).await?;

    Ok(ChainOutcome {
        location_id: location.location_id,
        location_key: location.location_key.clone(),
        ingestion_id,
        http_status: new.http_status as u16,
        rows_affected,
    })
}

/// Execute one full run: fan out over the active locations, then gate and
/// publish. Returns the per-chain report; only infrastructure failures
/// (listing locations, the snapshot rebuild itself, a panicked task)
/// propagate as `Err`.
pub async fn run_once<R, F>(
    repo: Arc<R>,
    fetcher: Arc<F>,
    options: &RunOptions,
) -> PipelineResult<RunReport>
where
    R: Repository + 'static,
    F: Fetcher + 'static,
{
    let locations = repo.list_active_locations().await?;
    info!("Starting ingestion run for {} active locations", locations.len());

    let mut handles = Vec::with_capacity(locations.len());
    for location in &locations {
        let repo = repo.clone();
        let fetcher = fetcher.clone();
        let endpoint = options.endpoint.clone();
        let location = location.clone();

        handles.push(tokio::spawn(async move {
            let result = ingest_location(repo.as_ref(), fetcher.as_ref(), &endpoint, &location).await;
            (location, result)
        }));
    }

    let mut ingested = Vec::new();
    let mut failures = Vec::new();

    for joined in join_all(handles).await {
        match joined {
            Ok((location, Ok(outcome))) => {
                info!(
                    "Ingested {} (status {}, ingestion {}, {} row(s))",
                    location.location_key,
                    outcome.http_status,
                    outcome.ingestion_id,
                    outcome.rows_affected
                );
                ingested.push(outcome);
            }
            Ok((location, Err(err))) => {
                error!("Chain for {} failed: {}", location.location_key, err);
                failures.push(ChainFailure {
                    location_id: location.location_id,
                    location_key: location.location_key,
                    error: err,
                });
            }
            Err(e) => {
                return Err(PipelineError::Repository(anyhow::anyhow!(
                    "ingestion task panicked: {e}"
                )));
            }
        }
    }

    // Expected count is the step-1 location list, not the number of chains
    // that happened to succeed.
    let expected = locations.len() as i64;

    let data_quality = if options.check_before_refresh {
        let gate = repo.check_data_quality(expected, options.max_lag).await;
        repo.refresh_latest_snapshot().await?;
        gate
    } else {
        repo.refresh_latest_snapshot().await?;
        repo.check_data_quality(expected, options.max_lag).await
    };

    if let Err(err) = &data_quality {
        error!("Data-quality gate failed: {}", err);
    }

    Ok(RunReport {
        locations: locations.len(),
        ingested,
        failures,
        data_quality,
    })
}
