pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod pipeline;

pub use config::Settings;
pub use db::{PostgresClient, Repository};
pub use error::{DataQualityError, FetchError, NormalizeError, PipelineError};
pub use fetch::{Fetcher, WeatherClient};
pub use pipeline::{run_once, RunOptions, RunReport};
