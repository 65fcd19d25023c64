//! Row → API model conversion.
//!
//! Rows come from our own schema, so a value that fails to parse is logged and
//! replaced with a default rather than failing the whole request.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use companion_db::models::{
    CompanionRow, ConversationRow, ImageRow, MessageRow, PreferencesRow, UserRow,
};
use companion_types::models::{
    Companion, Conversation, Image, Message, Role, User, UserPreferences,
};

pub fn parse_timestamp(raw: &str, field: &str, id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // datetime('now') style, no timezone. Stored values are UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt {} '{}' on '{}': {}", field, raw, id, e);
            DateTime::default()
        })
}

fn parse_uuid(raw: &str, field: &str, id: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on '{}': {}", field, raw, id, e);
        Uuid::default()
    })
}

fn parse_opt_uuid(raw: Option<&str>, field: &str, id: &str) -> Option<Uuid> {
    raw.map(|r| parse_uuid(r, field, id))
}

pub fn user(row: UserRow) -> User {
    User {
        created_at: parse_timestamp(&row.created_at, "created_at", &row.id),
        updated_at: parse_timestamp(&row.updated_at, "updated_at", &row.id),
        id: row.id,
        email: row.email,
        name: row.name,
        image_url: row.image_url,
    }
}

pub fn conversation(row: ConversationRow) -> Conversation {
    Conversation {
        id: parse_uuid(&row.id, "id", &row.id),
        companion_id: parse_opt_uuid(row.companion_id.as_deref(), "companion_id", &row.id),
        last_message_at: parse_timestamp(&row.last_message_at, "last_message_at", &row.id),
        created_at: parse_timestamp(&row.created_at, "created_at", &row.id),
        updated_at: parse_timestamp(&row.updated_at, "updated_at", &row.id),
        user_id: row.user_id,
        name: row.name,
    }
}

pub fn message(row: MessageRow) -> Message {
    let role = row.role.parse::<Role>().unwrap_or_else(|e| {
        warn!("{} on message '{}'", e, row.id);
        Role::User
    });
    Message {
        id: parse_uuid(&row.id, "id", &row.id),
        conversation_id: parse_uuid(&row.conversation_id, "conversation_id", &row.id),
        created_at: parse_timestamp(&row.created_at, "created_at", &row.id),
        content: row.content,
        role,
    }
}

pub fn messages(rows: Vec<MessageRow>) -> Vec<Message> {
    rows.into_iter().map(message).collect()
}

pub fn companion(row: CompanionRow) -> Companion {
    Companion {
        id: parse_uuid(&row.id, "id", &row.id),
        created_at: parse_timestamp(&row.created_at, "created_at", &row.id),
        updated_at: parse_timestamp(&row.updated_at, "updated_at", &row.id),
        user_id: row.user_id,
        name: row.name,
        description: row.description,
        instructions: row.instructions,
        seed: row.seed,
        image_url: row.image_url,
        personality: row.personality,
        behavior: row.behavior,
        response_style: row.response_style,
    }
}

pub fn preferences(row: PreferencesRow) -> UserPreferences {
    UserPreferences {
        default_companion_id: parse_opt_uuid(
            row.default_companion_id.as_deref(),
            "default_companion_id",
            &row.user_id,
        ),
        updated_at: parse_timestamp(&row.updated_at, "updated_at", &row.user_id),
        user_id: row.user_id,
    }
}

pub fn image(row: ImageRow) -> Image {
    Image {
        id: parse_uuid(&row.id, "id", &row.id),
        conversation_id: parse_opt_uuid(row.conversation_id.as_deref(), "conversation_id", &row.id),
        created_at: parse_timestamp(&row.created_at, "created_at", &row.id),
        user_id: row.user_id,
        url: row.url,
        prompt: row.prompt,
    }
}
