pub mod config;

pub use config::{ApiSettings, PipelineSettings, PostgresSettings, Settings};
