use std::sync::Arc;

use companion_db::Database;
use companion_llm::{RetryPolicy, SharedInference};
use tracing::error;

use crate::auth::AuthConfig;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub auth: AuthConfig,
    pub llm: SharedInference,
    pub retry: RetryPolicy,
    /// Prior messages included in a generation prompt.
    pub history_limit: u32,
}

/// Run a blocking DB call off the async runtime. Failures are logged under
/// `op` and surface as a bare 500.
pub async fn run_db<F, T>(state: &AppState, op: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("[{}] spawn_blocking join error: {}", op, e);
            ApiError::Internal
        })?
        .map_err(|e| {
            error!("[{}] {:#}", op, e);
            ApiError::Internal
        })
}
