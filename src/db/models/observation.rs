use chrono::{DateTime, Utc};

use crate::db::models::RawResponse;
use crate::normalize::ObservationFields;

/// One curated reading for `mart.weather_observation`.
///
/// Natural key: `(location_id, observed_at)`. A repeated observation for
/// the same key overwrites every derived column, last write wins.
#[derive(Debug, Clone)]
pub struct Observation {
    pub location_id: i64,
    pub observed_at: DateTime<Utc>,
    pub temp_c: Option<f64>,
    pub feels_like_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub wind_speed_mps: Option<f64>,
    pub wind_deg: Option<f64>,
    pub clouds_pct: Option<f64>,
    pub visibility_m: Option<f64>,
    pub rain_1h_mm: Option<f64>,
    pub snow_1h_mm: Option<f64>,
    pub weather_main: Option<String>,
    pub weather_description: Option<String>,
    pub ingested_at: DateTime<Utc>,
    pub source_ingestion_id: i64,
}

impl Observation {
    /// Attach identifiers and lineage to normalized fields. The ingestion
    /// timestamp is carried over from the raw row it was derived from.
    pub fn from_raw(raw: &RawResponse, fields: ObservationFields) -> Self {
        Self {
            location_id: raw.location_id,
            observed_at: fields.observed_at,
            temp_c: fields.temp_c,
            feels_like_c: fields.feels_like_c,
            humidity_pct: fields.humidity_pct,
            pressure_hpa: fields.pressure_hpa,
            wind_speed_mps: fields.wind_speed_mps,
            wind_deg: fields.wind_deg,
            clouds_pct: fields.clouds_pct,
            visibility_m: fields.visibility_m,
            rain_1h_mm: fields.rain_1h_mm,
            snow_1h_mm: fields.snow_1h_mm,
            weather_main: fields.weather_main,
            weather_description: fields.weather_description,
            ingested_at: raw.ingested_at,
            source_ingestion_id: raw.ingestion_id,
        }
    }
}
