//! HTTP fetcher for the OpenWeatherMap current-weather endpoint.
//!
//! One fetch is one attempt chain driven by the retry state machine in
//! `retry.rs`. The HTTP transport and the backoff sleep are behind traits
//! so the chain is testable with scripted responses and no real clock.

use std::time::Duration;

#[cfg(test)]
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ApiSettings;
use crate::error::FetchError;
use crate::fetch::retry::{is_retryable_status, AttemptOutcome, RetryPolicy, RetryState};
use crate::normalize::utc_from_epoch;

/// Query parameters echoed into the raw response record.
#[derive(Debug, Clone, Serialize)]
pub struct RequestParams {
    pub lat: f64,
    pub lon: f64,
    pub appid: String,
    pub units: String,
}

impl RequestParams {
    fn as_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("lat", self.lat.to_string()),
            ("lon", self.lon.to_string()),
            ("appid", self.appid.clone()),
            ("units", self.units.clone()),
        ]
    }
}

/// Outcome of one fetch: always carries the HTTP status and a payload,
/// even for server-returned errors. `data_timestamp` is the provider's
/// `dt` field when present; its absence is only fatal later, at
/// normalization time.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub http_status: u16,
    pub payload: Value,
    pub request_params: RequestParams,
    pub data_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Timeout or connection-level failure, before any HTTP status existed.
#[derive(Debug)]
pub struct TransportFailure(pub String);

#[async_trait]
pub trait HttpGet: Send + Sync {
    async fn get(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<HttpResponse, TransportFailure>;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Production transport backed by `reqwest`. The per-request timeout is
/// baked into the client at construction.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpGet for ReqwestHttp {
    async fn get(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<HttpResponse, TransportFailure> {
        let res = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| TransportFailure(e.to_string()))?;

        let status = res.status().as_u16();
        let body = res
            .text()
            .await
            .map_err(|e| TransportFailure(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

/// Abstraction the pipeline fans out over; implemented by `WeatherClient`
/// and by in-memory fakes in pipeline tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_current(&self, lat: f64, lon: f64) -> Result<FetchOutcome, FetchError>;
}

pub struct WeatherClient<H = ReqwestHttp, S = TokioSleeper> {
    http: H,
    sleeper: S,
    api_key: String,
    base_url: String,
    endpoint: String,
    units: String,
    policy: RetryPolicy,
}

impl WeatherClient {
    pub fn new(settings: &ApiSettings) -> anyhow::Result<Self> {
        let http = ReqwestHttp::new(Duration::from_secs(settings.timeout_seconds))?;
        Ok(Self::with_transport(http, TokioSleeper, settings))
    }
}

impl<H: HttpGet, S: Sleeper> WeatherClient<H, S> {
    pub fn with_transport(http: H, sleeper: S, settings: &ApiSettings) -> Self {
        Self {
            http,
            sleeper,
            api_key: settings.key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            endpoint: settings.endpoint.clone(),
            units: settings.units.clone(),
            policy: RetryPolicy {
                max_retries: settings.max_retries,
                backoff_base: Duration::from_secs_f64(settings.backoff_seconds),
            },
        }
    }

    fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.endpoint)
    }

    fn outcome(
        &self,
        res: HttpResponse,
        params: RequestParams,
        url: &str,
    ) -> Result<FetchOutcome, FetchError> {
        if res.status >= 400 {
            // Error bodies are kept for diagnostics, parsed best-effort;
            // a non-JSON body is wrapped rather than dropped.
            let payload = serde_json::from_str(&res.body)
                .unwrap_or_else(|_| json!({ "raw_text": res.body }));
            return Ok(FetchOutcome {
                http_status: res.status,
                payload,
                request_params: params,
                data_timestamp: None,
            });
        }

        let payload: Value =
            serde_json::from_str(&res.body).map_err(|e| FetchError::InvalidBody {
                url: url.to_string(),
                status: res.status,
                reason: e.to_string(),
            })?;

        let data_timestamp = payload.get("dt").and_then(utc_from_epoch);

        Ok(FetchOutcome {
            http_status: res.status,
            payload,
            request_params: params,
            data_timestamp,
        })
    }
}

enum Transient {
    Status(HttpResponse),
    Transport(TransportFailure),
}

#[async_trait]
impl<H: HttpGet, S: Sleeper> Fetcher for WeatherClient<H, S> {
    async fn fetch_current(&self, lat: f64, lon: f64) -> Result<FetchOutcome, FetchError> {
        let url = self.url();
        let params = RequestParams {
            lat,
            lon,
            appid: self.api_key.clone(),
            units: self.units.clone(),
        };
        let query = params.as_query();

        let mut state = RetryState::start();
        let mut done: Option<HttpResponse> = None;
        let mut last_transient: Option<Transient> = None;

        loop {
            match state {
                RetryState::Attempting { attempt } => {
                    match self.http.get(&url, &query).await {
                        Ok(res) if is_retryable_status(res.status) => {
                            warn!(
                                "GET {} returned {} (attempt {}), will retry",
                                url, res.status, attempt
                            );
                            last_transient = Some(Transient::Status(res));
                            state = self.policy.next(state, AttemptOutcome::Transient);
                        }
                        Ok(res) => {
                            debug!("GET {} returned {} (attempt {})", url, res.status, attempt);
                            done = Some(res);
                            state = self.policy.next(state, AttemptOutcome::Done);
                        }
                        Err(failure) => {
                            warn!(
                                "GET {} transport failure (attempt {}): {}",
                                url, attempt, failure.0
                            );
                            last_transient = Some(Transient::Transport(failure));
                            state = self.policy.next(state, AttemptOutcome::Transient);
                        }
                    }
                }
                RetryState::BackingOff { delay, .. } => {
                    self.sleeper.sleep(delay).await;
                    state = state.resume();
                }
                RetryState::Succeeded => {
                    let res = done.take().ok_or_else(|| FetchError::Exhausted {
                        url: url.clone(),
                        attempts: 0,
                        reason: "no response recorded".to_string(),
                    })?;
                    return self.outcome(res, params, &url);
                }
                RetryState::Exhausted => {
                    // Deliberate asymmetry: a server that kept answering
                    // with retryable statuses still produced a response
                    // worth persisting; only a transport that never
                    // answered is an error.
                    return match last_transient.take() {
                        Some(Transient::Status(res)) => self.outcome(res, params, &url),
                        Some(Transient::Transport(failure)) => Err(FetchError::Exhausted {
                            url: url.clone(),
                            attempts: self.policy.max_retries + 1,
                            reason: failure.0,
                        }),
                        None => Err(FetchError::Exhausted {
                            url: url.clone(),
                            attempts: self.policy.max_retries + 1,
                            reason: "no attempt recorded".to_string(),
                        }),
                    };
                }
            }
        }
    }
}

/// Transport fake that replays a fixed script of responses.
#[cfg(test)]
pub struct ScriptedHttp {
    script: Mutex<std::collections::VecDeque<Result<HttpResponse, TransportFailure>>>,
    pub requests: Mutex<Vec<(String, Vec<(&'static str, String)>)>>,
}

#[cfg(test)]
impl ScriptedHttp {
    pub fn new(script: Vec<Result<HttpResponse, TransportFailure>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl HttpGet for ScriptedHttp {
    async fn get(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<HttpResponse, TransportFailure> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), query.to_vec()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted transport ran out of responses")
    }
}

/// Sleeper fake that records delays instead of waiting.
#[cfg(test)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub fn new() -> Self {
        Self {
            delays: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ApiSettings {
        ApiSettings {
            key: "test-key".to_string(),
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            endpoint: "weather".to_string(),
            units: "metric".to_string(),
            timeout_seconds: 15,
            max_retries: 3,
            backoff_seconds: 1.0,
        }
    }

    fn ok(status: u16, body: &str) -> Result<HttpResponse, TransportFailure> {
        Ok(HttpResponse {
            status,
            body: body.to_string(),
        })
    }

    fn client(
        script: Vec<Result<HttpResponse, TransportFailure>>,
    ) -> WeatherClient<ScriptedHttp, RecordingSleeper> {
        WeatherClient::with_transport(ScriptedHttp::new(script), RecordingSleeper::new(), &settings())
    }

    #[tokio::test]
    async fn success_builds_outcome_with_data_timestamp() {
        let c = client(vec![ok(200, r#"{"dt": 1700000000, "main": {"temp": 10.5}}"#)]);

        let outcome = c.fetch_current(50.45, 30.52).await.unwrap();
        assert_eq!(outcome.http_status, 200);
        assert_eq!(
            outcome.data_timestamp.unwrap(),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap()
        );
        assert_eq!(outcome.payload["main"]["temp"], 10.5);
        assert_eq!(outcome.request_params.appid, "test-key");
        assert!(c.sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_url_and_query_are_correct() {
        let c = client(vec![ok(200, r#"{"dt": 1}"#)]);
        c.fetch_current(50.45, 30.52).await.unwrap();

        let requests = c.http.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (url, query) = &requests[0];
        assert_eq!(url, "https://api.openweathermap.org/data/2.5/weather");
        assert_eq!(
            query,
            &vec![
                ("lat", "50.45".to_string()),
                ("lon", "30.52".to_string()),
                ("appid", "test-key".to_string()),
                ("units", "metric".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_dt_yields_none_without_failing() {
        let c = client(vec![ok(200, r#"{"main": {"temp": 3.0}}"#)]);
        let outcome = c.fetch_current(0.0, 0.0).await.unwrap();
        assert_eq!(outcome.http_status, 200);
        assert!(outcome.data_timestamp.is_none());
    }

    #[tokio::test]
    async fn retries_503_with_exponential_backoff() {
        let c = client(vec![
            ok(503, "busy"),
            ok(503, "busy"),
            ok(200, r#"{"dt": 1700000000}"#),
        ]);

        let outcome = c.fetch_current(0.0, 0.0).await.unwrap();
        assert_eq!(outcome.http_status, 200);

        let delays = c.sleeper.delays.lock().unwrap();
        assert_eq!(
            *delays,
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert_eq!(c.http.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_retryable_status_returns_last_response() {
        let c = client(vec![
            ok(429, r#"{"cod": 429, "message": "rate limited"}"#),
            ok(429, r#"{"cod": 429, "message": "rate limited"}"#),
            ok(429, r#"{"cod": 429, "message": "rate limited"}"#),
            ok(429, r#"{"cod": 429, "message": "rate limited"}"#),
        ]);

        let outcome = c.fetch_current(0.0, 0.0).await.unwrap();
        assert_eq!(outcome.http_status, 429);
        assert_eq!(outcome.payload["message"], "rate limited");
        assert!(outcome.data_timestamp.is_none());
        // 4 attempts, 3 backoffs
        assert_eq!(c.sleeper.delays.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn transport_exhaustion_is_an_error() {
        let c = client(vec![
            Err(TransportFailure("connection refused".to_string())),
            Err(TransportFailure("connection refused".to_string())),
            Err(TransportFailure("connection refused".to_string())),
            Err(TransportFailure("connection refused".to_string())),
        ]);

        let err = c.fetch_current(0.0, 0.0).await.unwrap_err();
        match err {
            FetchError::Exhausted { attempts, reason, .. } => {
                assert_eq!(attempts, 4);
                assert!(reason.contains("connection refused"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_then_success_recovers() {
        let c = client(vec![
            Err(TransportFailure("timeout".to_string())),
            ok(200, r#"{"dt": 1}"#),
        ]);

        let outcome = c.fetch_current(0.0, 0.0).await.unwrap();
        assert_eq!(outcome.http_status, 200);
        assert_eq!(
            *c.sleeper.delays.lock().unwrap(),
            vec![Duration::from_secs(1)]
        );
    }

    #[tokio::test]
    async fn non_retryable_401_returns_immediately() {
        let c = client(vec![ok(401, r#"{"cod": 401, "message": "Invalid API key"}"#)]);

        let outcome = c.fetch_current(0.0, 0.0).await.unwrap();
        assert_eq!(outcome.http_status, 401);
        assert_eq!(outcome.payload["message"], "Invalid API key");
        assert!(outcome.data_timestamp.is_none());
        assert!(c.sleeper.delays.lock().unwrap().is_empty());
        assert_eq!(c.http.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_json_error_body_is_wrapped() {
        let c = client(vec![ok(404, "<html>not found</html>")]);

        let outcome = c.fetch_current(0.0, 0.0).await.unwrap();
        assert_eq!(outcome.http_status, 404);
        assert_eq!(outcome.payload["raw_text"], "<html>not found</html>");
    }

    #[tokio::test]
    async fn non_json_success_body_is_an_error() {
        let c = client(vec![ok(200, "definitely not json")]);

        let err = c.fetch_current(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidBody { status: 200, .. }));
    }
}
