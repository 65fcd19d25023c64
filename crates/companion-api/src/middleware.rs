use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{authenticate, session_token};
use crate::error::ApiError;
use crate::state::AppState;

/// Resolve the session to a local user and attach it as an `Extension<User>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(req.headers()).ok_or(ApiError::Unauthorized)?;
    let user = authenticate(&state, &token).await?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
