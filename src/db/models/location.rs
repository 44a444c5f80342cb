use serde::{Deserialize, Serialize};

/// A monitored geographic point from `dim.location`.
///
/// Rows are created and deactivated by an administrative process outside
/// this pipeline; here they are read-only. Only active locations are
/// fetched, so the active flag never travels with the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub location_id: i64,
    pub location_key: String,
    pub lat: f64,
    pub lon: f64,
}
