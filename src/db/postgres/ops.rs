use chrono::{DateTime, Utc};
use log::error;
use tokio_postgres::Row;

use crate::db::models::{
    LatestSnapshot, Location, NewRawResponse, Observation, RawResponse, SnapshotStats,
};
use crate::db::postgres::PostgresClient;

fn row_to_location(row: &Row) -> Location {
    Location {
        location_id: row.get("location_id"),
        location_key: row.get("location_key"),
        lat: row.get("lat"),
        lon: row.get("lon"),
    }
}

fn row_to_raw_response(row: &Row) -> RawResponse {
    RawResponse {
        ingestion_id: row.get("ingestion_id"),
        endpoint: row.get("endpoint"),
        location_id: row.get("location_id"),
        location_key: row.get("location_key"),
        http_status: row.get("http_status"),
        payload: row.get("payload"),
        ingested_at: row.get("ingested_at"),
    }
}

fn row_to_latest(row: &Row) -> LatestSnapshot {
    LatestSnapshot {
        location_id: row.get("location_id"),
        observed_at: row.get("observed_at"),
        temp_c: row.get("temp_c"),
        weather_main: row.get("weather_main"),
        weather_description: row.get("weather_description"),
        updated_at: row.get("updated_at"),
    }
}

impl PostgresClient {
    // ==================== LOCATIONS ====================

    /// Active monitored locations, ordered by id for a deterministic run.
    pub async fn list_active_locations(&self) -> anyhow::Result<Vec<Location>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT location_id, location_key, lat, lon
            FROM dim.location
            WHERE is_active = TRUE
            ORDER BY location_id
        "#;

        let rows = client.query(query, &[]).await?;
        Ok(rows.iter().map(row_to_location).collect())
    }

    // ==================== RAW RESPONSES ====================

    /// Append one API call outcome. No dedup, no updates: the raw table is
    /// the audit trail. Returns the store-generated ingestion id.
    pub async fn insert_raw_response(&self, new: &NewRawResponse) -> anyhow::Result<i64> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO raw.weather_api_responses
                (endpoint, location_id, location_key, request_params, http_status, data_timestamp, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING ingestion_id
        "#;

        let row = client
            .query_one(
                query,
                &[
                    &new.endpoint,
                    &new.location_id,
                    &new.location_key,
                    &new.request_params,
                    &new.http_status,
                    &new.data_timestamp,
                    &new.payload,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    "Failed to insert raw response for location {}: {:?}",
                    new.location_key, e
                );
                e
            })?;

        Ok(row.get("ingestion_id"))
    }

    /// Read one raw row back by id: the first half of the two-step curated
    /// upsert, kept separate so each half is testable on its own.
    pub async fn get_raw_response(&self, ingestion_id: i64) -> anyhow::Result<Option<RawResponse>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT ingestion_id, endpoint, location_id, location_key, http_status, payload, ingested_at
            FROM raw.weather_api_responses
            WHERE ingestion_id = $1
        "#;

        let row = client.query_opt(query, &[&ingestion_id]).await?;
        Ok(row.as_ref().map(row_to_raw_response))
    }

    // ==================== CURATED OBSERVATIONS ====================

    /// Insert-or-overwrite one curated observation, keyed by
    /// `(location_id, observed_at)`. Last write wins on every derived
    /// column. Returns the affected row count as Postgres reports it.
    pub async fn upsert_observation(&self, obs: &Observation) -> anyhow::Result<u64> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO mart.weather_observation (
                location_id, observed_at,
                temp_c, feels_like_c, humidity_pct, pressure_hpa,
                wind_speed_mps, wind_deg, clouds_pct, visibility_m,
                rain_1h_mm, snow_1h_mm,
                weather_main, weather_description,
                ingested_at, source_ingestion_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (location_id, observed_at) DO UPDATE SET
                temp_c              = EXCLUDED.temp_c,
                feels_like_c        = EXCLUDED.feels_like_c,
                humidity_pct        = EXCLUDED.humidity_pct,
                pressure_hpa        = EXCLUDED.pressure_hpa,
                wind_speed_mps      = EXCLUDED.wind_speed_mps,
                wind_deg            = EXCLUDED.wind_deg,
                clouds_pct          = EXCLUDED.clouds_pct,
                visibility_m        = EXCLUDED.visibility_m,
                rain_1h_mm          = EXCLUDED.rain_1h_mm,
                snow_1h_mm          = EXCLUDED.snow_1h_mm,
                weather_main        = EXCLUDED.weather_main,
                weather_description = EXCLUDED.weather_description,
                ingested_at         = EXCLUDED.ingested_at,
                source_ingestion_id = EXCLUDED.source_ingestion_id
        "#;

        let count = client
            .execute(
                query,
                &[
                    &obs.location_id,
                    &obs.observed_at,
                    &obs.temp_c,
                    &obs.feels_like_c,
                    &obs.humidity_pct,
                    &obs.pressure_hpa,
                    &obs.wind_speed_mps,
                    &obs.wind_deg,
                    &obs.clouds_pct,
                    &obs.visibility_m,
                    &obs.rain_1h_mm,
                    &obs.snow_1h_mm,
                    &obs.weather_main,
                    &obs.weather_description,
                    &obs.ingested_at,
                    &obs.source_ingestion_id,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    "Failed to upsert observation for location {}: {:?}",
                    obs.location_id, e
                );
                e
            })?;

        Ok(count)
    }

    // ==================== LATEST SNAPSHOT ====================

    /// Rebuild `mart.weather_latest` from the newest observation per
    /// location. A full rebuild is fine at an hourly-times-locations
    /// cardinality; at real scale this would have to go incremental.
    pub async fn refresh_latest_snapshot(&self) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO mart.weather_latest (
                location_id, observed_at,
                temp_c, feels_like_c, humidity_pct, pressure_hpa,
                wind_speed_mps, wind_deg, clouds_pct, visibility_m,
                rain_1h_mm, snow_1h_mm,
                weather_main, weather_description,
                updated_at
            )
            SELECT DISTINCT ON (location_id)
                location_id, observed_at,
                temp_c, feels_like_c, humidity_pct, pressure_hpa,
                wind_speed_mps, wind_deg, clouds_pct, visibility_m,
                rain_1h_mm, snow_1h_mm,
                weather_main, weather_description,
                NOW() AS updated_at
            FROM mart.weather_observation
            ORDER BY location_id, observed_at DESC
            ON CONFLICT (location_id) DO UPDATE SET
                observed_at         = EXCLUDED.observed_at,
                temp_c              = EXCLUDED.temp_c,
                feels_like_c        = EXCLUDED.feels_like_c,
                humidity_pct        = EXCLUDED.humidity_pct,
                pressure_hpa        = EXCLUDED.pressure_hpa,
                wind_speed_mps      = EXCLUDED.wind_speed_mps,
                wind_deg            = EXCLUDED.wind_deg,
                clouds_pct          = EXCLUDED.clouds_pct,
                visibility_m        = EXCLUDED.visibility_m,
                rain_1h_mm          = EXCLUDED.rain_1h_mm,
                snow_1h_mm          = EXCLUDED.snow_1h_mm,
                weather_main        = EXCLUDED.weather_main,
                weather_description = EXCLUDED.weather_description,
                updated_at          = EXCLUDED.updated_at
        "#;

        client.execute(query, &[]).await?;
        Ok(())
    }

    /// Post-refresh summary for the run report.
    pub async fn list_latest(&self) -> anyhow::Result<Vec<LatestSnapshot>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT location_id, observed_at, temp_c, weather_main, weather_description, updated_at
            FROM mart.weather_latest
            ORDER BY location_id
        "#;

        let rows = client.query(query, &[]).await?;
        Ok(rows.iter().map(row_to_latest).collect())
    }

    // ==================== DATA QUALITY ====================

    /// The two aggregates the data-quality gate decides on: latest
    /// snapshot row count and the newest observed_at across all curated
    /// observations.
    pub async fn snapshot_stats(&self) -> anyhow::Result<SnapshotStats> {
        let client = self.pool.get().await?;

        let count_row = client
            .query_one(
                "SELECT COUNT(*) AS latest_rows FROM mart.weather_latest",
                &[],
            )
            .await?;
        let latest_rows: i64 = count_row.get("latest_rows");

        let max_row = client
            .query_one(
                "SELECT MAX(observed_at) AS max_observed_at FROM mart.weather_observation",
                &[],
            )
            .await?;
        let max_observed_at: Option<DateTime<Utc>> = max_row.get("max_observed_at");

        Ok(SnapshotStats {
            latest_rows,
            max_observed_at,
        })
    }
}
