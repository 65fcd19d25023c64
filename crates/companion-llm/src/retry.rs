use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{InferenceClient, InferenceError};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th failure (1-based): `2^attempt * base_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Call `client` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` is used up. The last error is returned.
pub async fn generate_with_retry(
    client: &dyn InferenceClient,
    prompt: &str,
    system_prompt: &str,
    policy: RetryPolicy,
) -> Result<String, InferenceError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match client.generate(prompt, system_prompt).await {
            Ok(text) => {
                if attempt > 1 {
                    debug!("Generation succeeded on attempt {}", attempt);
                }
                return Ok(text);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "Generation failed (attempt {}/{}): {}; retrying in {} ms",
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
            }
            Err(e) => {
                warn!("Generation failed after {} attempt(s): {}", attempt, e);
                return Err(e);
            }
        }
    }
}
