//! Browser entry points. These sit outside the auth middleware: an anonymous
//! visitor is redirected rather than rejected.

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};

use companion_types::api::{ChatBootstrap, HealthResponse};

use crate::auth::optional_user;
use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, run_db};

const LANDING: &str = "Companion: chat with an AI companion. Sign in to start a conversation.";

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

/// GET /: signed-in visitors go straight to the chat.
pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match optional_user(&state, &headers).await {
        Some(_) => Redirect::temporary("/chat").into_response(),
        None => LANDING.into_response(),
    }
}

/// GET /chat: the signed-in user and their conversation list.
pub async fn chat_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(user) = optional_user(&state, &headers).await else {
        return Ok(Redirect::temporary("/").into_response());
    };

    let uid = user.id.clone();
    let rows = run_db(&state, "CHAT_PAGE", move |db| db.list_conversations(&uid)).await?;

    Ok(Json(ChatBootstrap {
        user,
        conversations: rows.into_iter().map(convert::conversation).collect(),
    })
    .into_response())
}
