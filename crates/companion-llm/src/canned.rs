use async_trait::async_trait;

use crate::{InferenceClient, InferenceError};

pub const CANNED_REPLY: &str =
    "Hello! I'm your AI companion. I'm here to help you with any questions or tasks you might have.";

/// Offline stand-in for the hosted model. Always answers with the same greeting.
#[derive(Debug, Clone, Default)]
pub struct CannedClient;

#[async_trait]
impl InferenceClient for CannedClient {
    async fn generate(&self, _prompt: &str, _system_prompt: &str) -> Result<String, InferenceError> {
        Ok(CANNED_REPLY.to_string())
    }
}
