use std::sync::Arc;

use anyhow::Context;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use stratus::pipeline::{run_once, RunOptions};
use stratus::{PostgresClient, Settings, WeatherClient};

/// One unit of work for an external scheduler: a single extract-normalize-
/// load run over all active locations. Exit code reflects run success, so
/// cron/Airflow can apply their own retry policy on top.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    // Load configuration
    let settings = Settings::new()
        .context("Failed to load config.yaml. Please ensure it exists and is valid")?;

    let db = Arc::new(
        PostgresClient::new(settings.postgres.clone())
            .await
            .context("Failed to initialize database connection")?,
    );

    let client = Arc::new(
        WeatherClient::new(&settings.api).context("Failed to build weather API client")?,
    );

    let options = RunOptions::from_settings(&settings.api, &settings.pipeline);
    let report = run_once(db.clone(), client, &options).await?;

    for failure in &report.failures {
        error!(
            "Location {} failed this run: {}",
            failure.location_key, failure.error
        );
    }

    match db.list_latest().await {
        Ok(latest) => {
            let newest = latest.iter().map(|row| row.observed_at).max();
            info!(
                "Latest snapshot covers {} location(s), newest observation: {}",
                latest.len(),
                newest.map_or_else(|| "none".to_string(), |ts| ts.to_rfc3339())
            );
        }
        Err(e) => error!("Failed to read latest snapshot summary: {:#}", e),
    }

    if report.succeeded() {
        info!(
            "Run complete: {}/{} locations ingested",
            report.ingested.len(),
            report.locations
        );
        Ok(())
    } else {
        if let Err(dq) = &report.data_quality {
            error!("Run failed data-quality gate: {}", dq);
        }
        anyhow::bail!(
            "ingestion run failed: {}/{} chains succeeded, data quality {}",
            report.ingested.len(),
            report.locations,
            if report.data_quality.is_ok() { "ok" } else { "failed" }
        )
    }
}
