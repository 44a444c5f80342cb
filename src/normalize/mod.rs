//! Normalization of raw OpenWeatherMap "current weather" payloads into the
//! curated observation shape.
//!
//! Pure functions, no I/O. The only mandatory field is `dt` (observation
//! time, Unix epoch seconds); every other field degrades to NULL when the
//! payload omits it or carries it with an unexpected type. No unit
//! conversion happens here: the request's `units` parameter decides what
//! the provider sends, and the curated column names assume metric.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::NormalizeError;

/// Curated observation fields derived from one raw payload.
///
/// Matches the `mart.weather_observation` columns minus the identifiers
/// (`location_id`, `source_ingestion_id`) and the ingestion timestamp,
/// which are attached at upsert time.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFields {
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
}

/// Interpret a JSON value as Unix epoch seconds. Fractional seconds are
/// truncated, matching how the provider reports `dt`.
pub fn utc_from_epoch(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

fn nested_number(payload: &Value, object: &str, field: &str) -> Option<f64> {
    payload.get(object)?.get(field)?.as_f64()
}

fn top_level_number(payload: &Value, field: &str) -> Option<f64> {
    payload.get(field)?.as_f64()
}

/// The first element of the `weather` list, when the list exists and its
/// head is an object. Anything else means no classification.
fn weather_head(payload: &Value) -> Option<&Value> {
    let head = payload.get("weather")?.as_array()?.first()?;
    head.is_object().then_some(head)
}

/// Map a raw payload to curated observation fields.
///
/// Fails only when the payload has no usable `dt`. Absent `rain`/`snow`
/// containers yield NULL, not zero: missing precipitation data is not the
/// same fact as zero precipitation.
pub fn normalize(payload: &Value) -> Result<ObservationFields, NormalizeError> {
    let observed_at = payload
        .get("dt")
        .and_then(utc_from_epoch)
        .ok_or(NormalizeError::MissingObservedAt)?;

    let weather = weather_head(payload);

    Ok(ObservationFields {
        observed_at,
        temp_c: nested_number(payload, "main", "temp"),
        feels_like_c: nested_number(payload, "main", "feels_like"),
        humidity_pct: nested_number(payload, "main", "humidity"),
        pressure_hpa: nested_number(payload, "main", "pressure"),
        wind_speed_mps: nested_number(payload, "wind", "speed"),
        wind_deg: nested_number(payload, "wind", "deg"),
        clouds_pct: nested_number(payload, "clouds", "all"),
        visibility_m: top_level_number(payload, "visibility"),
        rain_1h_mm: nested_number(payload, "rain", "1h"),
        snow_1h_mm: nested_number(payload, "snow", "1h"),
        weather_main: weather
            .and_then(|w| w.get("main"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        weather_description: weather
            .and_then(|w| w.get("description"))
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}
