use chrono::{DateTime, Utc};

/// One row of `mart.weather_latest`: the newest observation per location,
/// keyed by `location_id` alone. The table is fully rebuilt per run.
#[derive(Debug, Clone)]
pub struct LatestSnapshot {
    pub location_id: i64,
    pub observed_at: DateTime<Utc>,
    pub temp_c: Option<f64>,
    pub weather_main: Option<String>,
    pub weather_description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate state the data-quality gate reads: how many locations the
/// latest snapshot covers and the newest observation overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotStats {
    pub latest_rows: i64,
    pub max_observed_at: Option<DateTime<Utc>>,
}
