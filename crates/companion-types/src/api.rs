use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{Conversation, User};

// -- JWT Claims --

/// Claims carried by the auth provider's session token.
///
/// Only `sub` is mandatory. Profile fields are used to create the local user
/// row the first time an identity is seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

// -- Conversations --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub companion_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateConversationRequest {
    pub name: String,
}

// -- Chat --

/// Body of `POST /api/chat`. The web client sends `null` or `""` for ids it
/// does not have yet.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub conversation_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub companion_id: Option<Uuid>,
}

// -- Companions --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCompanionRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub instructions: String,
    #[serde(default)]
    pub seed: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "default_personality")]
    pub personality: String,
    #[serde(default = "default_behavior")]
    pub behavior: String,
    #[serde(default = "default_response_style")]
    pub response_style: String,
}

fn default_personality() -> String {
    "friendly".to_string()
}

fn default_behavior() -> String {
    "balanced".to_string()
}

fn default_response_style() -> String {
    "conversational".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCompanionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub seed: Option<String>,
    pub image_url: Option<String>,
    pub personality: Option<String>,
    pub behavior: Option<String>,
    pub response_style: Option<String>,
}

// -- Preferences --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePreferencesRequest {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub default_companion_id: Option<Uuid>,
}

// -- Pages --

/// What the chat page needs to render its sidebar.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBootstrap {
    pub user: User,
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
