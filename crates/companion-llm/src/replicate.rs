//! Client for Replicate's hosted prediction API.
//!
//! Predictions are created with `Prefer: wait` so short generations come back
//! in the first response. Longer ones are polled through `urls.get` until they
//! settle or the deadline passes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{InferenceClient, InferenceError};

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";
pub const DEFAULT_MODEL: &str = "meta/meta-llama-3-8b-instruct";

#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_key: String,
    /// `owner/name` slug of an official model.
    pub model: String,
    pub base_url: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl ReplicateConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_new_tokens: 512,
            temperature: 0.7,
            poll_interval: Duration::from_secs(1),
            deadline: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Clone)]
pub struct ReplicateClient {
    http: Client,
    config: ReplicateConfig,
}

impl ReplicateClient {
    pub fn new(config: ReplicateConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn predictions_url(&self) -> String {
        format!(
            "{}/v1/models/{}/predictions",
            self.config.base_url, self.config.model
        )
    }

    async fn create_prediction(&self, body: &PredictionRequest<'_>) -> Result<Prediction, InferenceError> {
        let response = self
            .http
            .post(self.predictions_url())
            .bearer_auth(&self.config.api_key)
            .header("Prefer", "wait")
            .json(body)
            .send()
            .await?;
        read_prediction(response).await
    }

    /// Run one step of a generation with whatever is left of the deadline.
    async fn within_deadline<T>(
        &self,
        started: Instant,
        step: impl Future<Output = Result<T, InferenceError>>,
    ) -> Result<T, InferenceError> {
        let deadline = self.config.deadline;
        let remaining = deadline
            .checked_sub(started.elapsed())
            .filter(|d| !d.is_zero())
            .ok_or(InferenceError::Timeout(deadline))?;
        tokio::time::timeout(remaining, step)
            .await
            .map_err(|_| InferenceError::Timeout(deadline))?
    }

    async fn fetch_prediction(&self, url: &str) -> Result<Prediction, InferenceError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        read_prediction(response).await
    }
}

#[async_trait]
impl InferenceClient for ReplicateClient {
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, InferenceError> {
        let body = PredictionRequest {
            input: PredictionInput {
                prompt,
                system_prompt,
                max_new_tokens: self.config.max_new_tokens,
                temperature: self.config.temperature,
            },
        };

        let started = Instant::now();
        let mut prediction = self
            .within_deadline(started, self.create_prediction(&body))
            .await?;

        // Always poll the URL handed out at creation.
        let poll_url = prediction.poll_url();

        while prediction.is_pending() {
            let url = poll_url
                .as_deref()
                .ok_or_else(|| InferenceError::Decode("pending prediction without urls.get".into()))?;

            debug!(
                "Prediction {} is {}, polling",
                prediction.id.as_deref().unwrap_or("?"),
                prediction.status
            );
            self.within_deadline(started, async {
                tokio::time::sleep(self.config.poll_interval).await;
                Ok(())
            })
            .await?;
            prediction = self
                .within_deadline(started, self.fetch_prediction(url))
                .await?;
        }

        prediction.into_text()
    }
}

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PredictionRequest<'a> {
    input: PredictionInput<'a>,
}

#[derive(Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    system_prompt: &'a str,
    max_new_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: Option<String>,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

impl Prediction {
    fn poll_url(&self) -> Option<String> {
        self.urls.as_ref().and_then(|u| u.get.clone())
    }

    fn is_pending(&self) -> bool {
        matches!(self.status.as_str(), "starting" | "processing")
    }

    fn into_text(self) -> Result<String, InferenceError> {
        match self.status.as_str() {
            "succeeded" => {}
            "failed" | "canceled" => {
                let reason = match self.error {
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => "no error detail".to_string(),
                };
                return Err(InferenceError::Prediction(format!("{}: {}", self.status, reason)));
            }
            other => {
                return Err(InferenceError::Decode(format!("unexpected prediction status '{}'", other)));
            }
        }

        let text = match self.output {
            Some(Value::String(s)) => s,
            // Language models stream tokens, so output arrives as fragments.
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|p| p.as_str())
                .collect::<String>(),
            Some(Value::Null) | None => String::new(),
            Some(other) => {
                return Err(InferenceError::Decode(format!("unsupported output shape: {}", other)));
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(InferenceError::EmptyOutput);
        }
        Ok(text.to_string())
    }
}

async fn read_prediction(response: reqwest::Response) -> Result<Prediction, InferenceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        return Err(InferenceError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<Prediction>()
        .await
        .map_err(|e| InferenceError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves `router` on an ephemeral port and returns its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base_url: &str) -> ReplicateClient {
        let mut config = ReplicateConfig::new("r8_test").with_base_url(base_url);
        config.poll_interval = Duration::from_millis(5);
        config.deadline = Duration::from_secs(5);
        ReplicateClient::new(config)
    }

    #[tokio::test]
    async fn joins_streamed_output_fragments() {
        let router = Router::new().route(
            "/v1/models/{owner}/{name}/predictions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer r8_test");
                assert_eq!(headers["prefer"], "wait");
                assert_eq!(body["input"]["system_prompt"], "be nice");
                assert_eq!(body["input"]["prompt"], "User: hi");
                Json(json!({
                    "id": "p1",
                    "status": "succeeded",
                    "output": ["Hel", "lo", " there "],
                }))
            }),
        );
        let base = serve(router).await;

        let text = client_for(&base).generate("User: hi", "be nice").await.unwrap();
        assert_eq!(text, "Hello there");
    }

    #[tokio::test]
    async fn polls_until_prediction_settles() {
        let polls = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/v1/models/{owner}/{name}/predictions",
                post(|headers: HeaderMap| async move {
                    let host = headers["host"].to_str().unwrap().to_string();
                    Json(json!({
                        "id": "p2",
                        "status": "starting",
                        "output": null,
                        "urls": { "get": format!("http://{}/v1/predictions/p2", host) },
                    }))
                }),
            )
            .route(
                "/v1/predictions/p2",
                get(|State(polls): State<Arc<AtomicU32>>| async move {
                    let n = polls.fetch_add(1, Ordering::SeqCst);
                    let (status, output) = if n < 2 {
                        ("processing", Value::Null)
                    } else {
                        ("succeeded", json!("done"))
                    };
                    Json(json!({
                        "id": "p2",
                        "status": status,
                        "output": output,
                        "urls": { "get": "unused" },
                    }))
                }),
            )
            .with_state(polls.clone());
        let base = serve(router).await;

        let text = client_for(&base).generate("p", "s").await.unwrap();
        assert_eq!(text, "done");
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_prediction_reports_reason() {
        let router = Router::new().route(
            "/v1/models/{owner}/{name}/predictions",
            post(|| async {
                Json(json!({ "id": "p3", "status": "failed", "error": "CUDA out of memory" }))
            }),
        );
        let base = serve(router).await;

        let err = client_for(&base).generate("p", "s").await.unwrap_err();
        match err {
            InferenceError::Prediction(msg) => assert!(msg.contains("CUDA out of memory")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn http_errors_carry_status() {
        let router = Router::new().route(
            "/v1/models/{owner}/{name}/predictions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = serve(router).await;

        let err = client_for(&base).generate("p", "s").await.unwrap_err();
        assert!(matches!(err, InferenceError::Status { status: 429, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn blank_output_is_empty() {
        let router = Router::new().route(
            "/v1/models/{owner}/{name}/predictions",
            post(|| async { Json(json!({ "id": "p4", "status": "succeeded", "output": ["  "] })) }),
        );
        let base = serve(router).await;

        let err = client_for(&base).generate("p", "s").await.unwrap_err();
        assert!(matches!(err, InferenceError::EmptyOutput));
    }

    #[tokio::test]
    async fn stalled_create_hits_the_deadline() {
        let router = Router::new().route(
            "/v1/models/{owner}/{name}/predictions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "id": "p5", "status": "succeeded", "output": "late" }))
            }),
        );
        let base = serve(router).await;

        let mut config = ReplicateConfig::new("r8_test").with_base_url(&base);
        config.deadline = Duration::from_millis(300);
        let started = Instant::now();
        let err = ReplicateClient::new(config).generate("p", "s").await.unwrap_err();

        assert!(matches!(err, InferenceError::Timeout(_)));
        assert!(err.is_retryable());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn stalled_poll_hits_the_deadline() {
        let router = Router::new()
            .route(
                "/v1/models/{owner}/{name}/predictions",
                post(|headers: HeaderMap| async move {
                    let host = headers["host"].to_str().unwrap().to_string();
                    Json(json!({
                        "id": "p6",
                        "status": "processing",
                        "urls": { "get": format!("http://{}/v1/predictions/p6", host) },
                    }))
                }),
            )
            .route(
                "/v1/predictions/p6",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Json(json!({ "id": "p6", "status": "succeeded", "output": "late" }))
                }),
            );
        let base = serve(router).await;

        let mut config = ReplicateConfig::new("r8_test").with_base_url(&base);
        config.poll_interval = Duration::from_millis(5);
        config.deadline = Duration::from_millis(300);
        let started = Instant::now();
        let err = ReplicateClient::new(config).generate("p", "s").await.unwrap_err();

        assert!(matches!(err, InferenceError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
