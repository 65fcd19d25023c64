#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;

use companion_api::auth::AuthConfig;
use companion_api::{AppState, AppStateInner, router};
use companion_db::Database;
use companion_llm::{InferenceClient, InferenceError, RetryPolicy};
use companion_types::api::Claims;

pub const SECRET: &str = "integration-test-secret";

/// Inference stand-in: fails `failures` times with a 503, then answers with
/// `reply`. Every prompt it sees is recorded.
pub struct Scripted {
    reply: String,
    failures: AtomicU32,
    pub calls: AtomicU32,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl Scripted {
    pub fn replying(reply: &str) -> Arc<Self> {
        Self::failing_then(0, reply)
    }

    pub fn failing_then(failures: u32, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> (String, String) {
        self.prompts.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl InferenceClient for Scripted {
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), system_prompt.to_string()));

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(InferenceError::Status {
                status: 503,
                body: "overloaded".into(),
            });
        }
        Ok(self.reply.clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub llm: Arc<Scripted>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_llm(Scripted::replying("Hello from the companion!"))
    }

    pub fn with_llm(llm: Arc<Scripted>) -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            auth: AuthConfig::new(SECRET),
            llm: llm.clone(),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
            history_limit: 20,
        });
        Self {
            router: router(state.clone()),
            state,
            llm,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    /// Raw response, for checking redirects and headers.
    pub async fn raw(&self, req: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(req).await.unwrap()
    }
}

/// HS256 session token for `sub`, valid for an hour.
pub fn token(sub: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        email: Some(format!("{}@example.com", sub)),
        name: Some(sub.to_string()),
        image_url: None,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}
