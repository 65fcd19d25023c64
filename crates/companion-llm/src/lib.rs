//! Text generation for companion replies.
//!
//! The hosted model sits behind [`InferenceClient`] so handlers and tests can
//! swap it out. [`generate_with_retry`] wraps any client with exponential
//! backoff.

pub mod canned;
pub mod prompt;
pub mod replicate;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use canned::CannedClient;
pub use replicate::{ReplicateClient, ReplicateConfig};
pub use retry::{RetryPolicy, generate_with_retry};

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("inference API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("prediction {0}")]
    Prediction(String),

    #[error("model returned no output")]
    EmptyOutput,

    #[error("prediction did not finish within {0:?}")]
    Timeout(Duration),

    #[error("could not decode inference response: {0}")]
    Decode(String),
}

impl InferenceError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Prediction(_) | Self::EmptyOutput | Self::Timeout(_) => true,
            Self::Status { status, .. } => matches!(status, 408 | 429 | 500..=599),
            Self::Decode(_) => false,
        }
    }
}

/// A hosted language model: prompt and system instruction in, text out.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, InferenceError>;
}

pub type SharedInference = Arc<dyn InferenceClient>;
