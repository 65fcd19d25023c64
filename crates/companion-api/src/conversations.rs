use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use companion_types::api::{CreateConversationRequest, UpdateConversationRequest};
use companion_types::models::{ConversationWithMessages, User};

use crate::companions::visible_companion;
use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// Longest accepted conversation name, in characters.
pub const MAX_NAME_CHARS: usize = 100;

fn validate_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name cannot be empty".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Name cannot exceed {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

/// GET /api/conversations: most recently active first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, "CONVERSATIONS_GET", move |db| db.list_conversations(&user.id)).await?;
    Ok(Json(rows.into_iter().map(convert::conversation).collect::<Vec<_>>()))
}

/// POST /api/conversations: body is optional; without a name the
/// conversation is called "New Conversation".
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    body: Option<Json<CreateConversationRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let name = req.name.as_deref().map(validate_name).transpose()?;
    if let Some(companion_id) = req.companion_id {
        visible_companion(&state, companion_id, &user.id).await?;
    }

    let id = Uuid::new_v4();
    let uid = user.id.clone();
    let row = run_db(&state, "CONVERSATIONS_POST", move |db| {
        db.create_conversation(
            &id.to_string(),
            &uid,
            name.as_deref(),
            req.companion_id.map(|c| c.to_string()).as_deref(),
        )
    })
    .await?;

    info!("Created conversation {} for {}", id, user.id);
    Ok((StatusCode::CREATED, Json(convert::conversation(row))))
}

/// GET /api/conversations/{id}: the conversation with its messages.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let (row, messages) = run_db(&state, "CONVERSATION_GET", move |db| {
        let cid = id.to_string();
        match db.get_conversation(&cid, &user.id)? {
            Some(row) => Ok(Some((row, db.list_messages(&cid)?))),
            None => Ok(None),
        }
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(ConversationWithMessages {
        conversation: convert::conversation(row),
        messages: convert::messages(messages),
    }))
}

/// PATCH /api/conversations/{id}
pub async fn rename_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(req): Json<UpdateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate_name(&req.name)?;

    let row = run_db(&state, "CONVERSATION_PATCH", move |db| {
        db.rename_conversation(&id.to_string(), &user.id, &name)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(convert::conversation(row)))
}

/// DELETE /api/conversations/{id}: returns the deleted row. Messages are
/// removed by the cascade.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user.id.clone();
    let row = run_db(&state, "CONVERSATION_DELETE", move |db| {
        db.delete_conversation(&id.to_string(), &uid)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    info!("Deleted conversation {} for {}", id, user.id);
    Ok(Json(convert::conversation(row)))
}

/// GET /api/conversations/{id}/messages: oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, "MESSAGES_GET", move |db| {
        let cid = id.to_string();
        if db.get_conversation(&cid, &user.id)?.is_none() {
            return Ok(None);
        }
        db.list_messages(&cid).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(convert::messages(rows)))
}
