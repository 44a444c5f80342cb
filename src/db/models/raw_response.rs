use chrono::{DateTime, Utc};
use serde_json::Value;

/// One API call outcome, to be appended to `raw.weather_api_responses`.
///
/// Every fetch that obtained an HTTP response produces exactly one row,
/// failing statuses included; only transport exhaustion produces none.
#[derive(Debug, Clone)]
pub struct NewRawResponse {
    pub endpoint: String,
    pub location_id: i64,
    pub location_key: String,
    pub request_params: Value,
    pub http_status: i32,
    pub data_timestamp: Option<DateTime<Utc>>,
    pub payload: Value,
}

/// A raw row read back by `ingestion_id` for the curated upsert.
/// Append-only: never updated or deleted by this pipeline.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub ingestion_id: i64,
    pub endpoint: String,
    pub location_id: i64,
    pub location_key: String,
    pub http_status: i32,
    pub payload: Value,
    pub ingested_at: DateTime<Utc>,
}
