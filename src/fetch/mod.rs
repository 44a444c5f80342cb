pub mod client;
pub mod retry;

pub use client::{FetchOutcome, Fetcher, RequestParams, WeatherClient};
pub use retry::{AttemptOutcome, RetryPolicy, RetryState};
