use config::{Config, ConfigError, File};
use serde::Deserialize;

/// OpenWeatherMap API configuration.
///
/// The key is an already-resolved credential: whoever launches the unit of
/// work (cron, Airflow, systemd timer) is responsible for putting it into
/// `config.yaml`; nothing here talks to a secrets backend.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: f64,
}

fn default_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_endpoint() -> String {
    // OpenWeatherMap "Current Weather Data"
    "weather".to_string()
}

fn default_units() -> String {
    // The curated column names (_c, _mps, _hpa, _mm) assume metric.
    "metric".to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_seconds() -> f64 {
    1.0
}

/// PostgreSQL warehouse connection configuration.
///
/// Holds the monitored locations (`dim.location`), the append-only raw
/// responses (`raw.weather_api_responses`) and the curated mart tables.
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// Pipeline run configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineSettings {
    /// Maximum tolerated age of the newest observation before the
    /// data-quality gate fails the run.
    #[serde(default = "default_max_lag_minutes")]
    pub max_lag_minutes: i64,
    /// Whether the data-quality gate reads the latest snapshot *before* it
    /// is refreshed (the historically documented behavior) or after.
    #[serde(default = "default_check_before_refresh")]
    pub check_before_refresh: bool,
}

fn default_max_lag_minutes() -> i64 {
    180
}

fn default_check_before_refresh() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_lag_minutes: default_max_lag_minutes(),
            check_before_refresh: default_check_before_refresh(),
        }
    }
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub postgres: PostgresSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
