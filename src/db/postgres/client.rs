use std::time::Duration;

use anyhow::Context;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use log::{info, warn};
use tokio_postgres::NoTls;

use crate::config::PostgresSettings;

const CONNECT_ATTEMPTS: u32 = 3;

/// PostgreSQL client with connection pooling.
///
/// Owns every persistence operation of the pipeline: the location
/// dimension, the append-only raw responses and the curated mart tables.
/// The warehouse schema is assumed to pre-exist; no DDL runs from here.
#[derive(Clone)]
pub struct PostgresClient {
    pub pool: Pool,
}

impl PostgresClient {
    /// Build the pool and verify a connection can actually be checked
    /// out, retrying briefly so a warehouse restart at the top of the
    /// hour does not kill the run.
    pub async fn new(settings: PostgresSettings) -> anyhow::Result<Self> {
        info!(
            "Connecting to PostgreSQL at {}:{}/{}",
            settings.host, settings.port, settings.database
        );

        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.user)
            .password(&settings.password)
            .dbname(&settings.database);

        let mgr = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(mgr)
            .max_size(settings.pool_size)
            .build()
            .context("Failed to create PostgreSQL connection pool")?;

        let mut last_error = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match pool.get().await {
                Ok(_conn) => {
                    info!("Successfully connected to PostgreSQL");
                    return Ok(Self { pool });
                }
                Err(e) => {
                    if attempt < CONNECT_ATTEMPTS {
                        let delay = Duration::from_millis(100 * 2_u64.pow(attempt));
                        warn!(
                            "Failed to connect to PostgreSQL (attempt {}/{}), retrying in {:?}...",
                            attempt, CONNECT_ATTEMPTS, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(anyhow::anyhow!(
            "Failed to connect to PostgreSQL after {} attempts: {}",
            CONNECT_ATTEMPTS,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string())
        ))
    }
}
