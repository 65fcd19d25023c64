use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::{error, info};
use uuid::Uuid;

use companion_db::Database;
use companion_db::models::{CompanionRow, ConversationRow};
use companion_llm::generate_with_retry;
use companion_llm::prompt::{build_prompt, build_system_prompt};
use companion_types::api::ChatRequest;
use companion_types::models::{Role, User};

use crate::companions::visible_companion;
use crate::conversations::MAX_NAME_CHARS;
use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// POST /api/chat: store the user's message, generate the companion's reply
/// and return it. Without a `conversationId` a new conversation is started.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.message.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }

    let conversation = match req.conversation_id {
        Some(id) => {
            let uid = user.id.clone();
            run_db(&state, "CHAT", move |db| db.get_conversation(&id.to_string(), &uid))
                .await?
                .ok_or(ApiError::NotFound)?
        }
        None => start_conversation(&state, &user, &content, req.companion_id).await?,
    };

    let conversation_id = conversation.id.clone();
    let limit = state.history_limit;
    let (companion, history) = {
        let cid = conversation_id.clone();
        let uid = user.id.clone();
        run_db(&state, "CHAT", move |db| {
            db.insert_message(&Uuid::new_v4().to_string(), &cid, Role::User.as_str(), &content)?;
            let companion = resolve_companion(db, &conversation, &uid)?;
            let history = db.recent_messages(&cid, limit)?;
            Ok((companion, history))
        })
        .await?
    };

    let companion = convert::companion(companion);
    let system_prompt = build_system_prompt(&companion);
    let prompt = build_prompt(&companion.name, &convert::messages(history));

    let reply = generate_with_retry(state.llm.as_ref(), &prompt, &system_prompt, state.retry)
        .await
        .map_err(|e| {
            error!("[CHAT] Generation failed for conversation {}: {}", conversation_id, e);
            ApiError::Upstream
        })?;

    let row = run_db(&state, "CHAT", move |db| {
        db.insert_message(
            &Uuid::new_v4().to_string(),
            &conversation_id,
            Role::Assistant.as_str(),
            reply.trim(),
        )
    })
    .await?;

    Ok(Json(convert::message(row)))
}

/// New conversation named after the opening message, tied to the requested
/// companion or else the user's preferred one.
async fn start_conversation(
    state: &AppState,
    user: &User,
    content: &str,
    companion_id: Option<Uuid>,
) -> Result<ConversationRow, ApiError> {
    if let Some(id) = companion_id {
        visible_companion(state, id, &user.id).await?;
    }

    let name: String = content.chars().take(MAX_NAME_CHARS).collect();
    let id = Uuid::new_v4().to_string();
    let uid = user.id.clone();
    let row = run_db(state, "CHAT", move |db| {
        let companion_id = match companion_id {
            Some(c) => Some(c.to_string()),
            None => db.get_preferences(&uid)?.and_then(|p| p.default_companion_id),
        };
        db.create_conversation(&id, &uid, Some(name.trim_end()), companion_id.as_deref())
    })
    .await?;

    info!("Started conversation {} for {}", row.id, user.id);
    Ok(row)
}

/// The conversation's companion, else the user's preference, else the
/// built-in default.
fn resolve_companion(
    db: &Database,
    conversation: &ConversationRow,
    user_id: &str,
) -> anyhow::Result<CompanionRow> {
    if let Some(id) = conversation.companion_id.as_deref() {
        if let Some(row) = db.get_companion(id)? {
            return Ok(row);
        }
    }
    if let Some(id) = db.get_preferences(user_id)?.and_then(|p| p.default_companion_id) {
        if let Some(row) = db.get_companion(&id)? {
            return Ok(row);
        }
    }
    db.default_companion()?
        .ok_or_else(|| anyhow::anyhow!("default companion is missing"))
}
