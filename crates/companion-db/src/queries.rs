use crate::Database;
use crate::migrations::DEFAULT_COMPANION_ID;
use crate::models::{
    CompanionPatch, CompanionRow, ConversationRow, ImageRow, MessageRow, NewCompanion,
    PreferencesRow, UserRow,
};
use anyhow::{Result, anyhow};
use rusqlite::Row;

const USER_COLUMNS: &str = "id, email, name, image_url, created_at, updated_at";
const CONVERSATION_COLUMNS: &str =
    "id, user_id, companion_id, name, last_message_at, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, content, role, created_at";
const COMPANION_COLUMNS: &str = "id, user_id, name, description, instructions, seed, image_url, \
     personality, behavior, response_style, created_at, updated_at";
const PREFERENCES_COLUMNS: &str = "user_id, default_companion_id, updated_at";
const IMAGE_COLUMNS: &str = "id, user_id, conversation_id, url, prompt, created_at";

impl Database {
    // -- Users --

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    /// Insert the identity if it has never been seen, then return the stored row.
    /// Profile fields of an existing user are left as they are.
    pub fn get_or_create_user(
        &self,
        id: &str,
        email: &str,
        name: &str,
        image_url: &str,
    ) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, image_url) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO NOTHING",
                (id, email, name, image_url),
            )?;
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                user_from_row,
            )
            .map_err(|e| anyhow!("User {} missing after upsert: {}", id, e))
        })
    }

    // -- Conversations --

    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE user_id = ?1
                 ORDER BY last_message_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], conversation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Fetch a conversation only if `user_id` owns it.
    pub fn get_conversation(&self, id: &str, user_id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1 AND user_id = ?2"
                ),
                [id, user_id],
                conversation_from_row,
            )
            .optional()
        })
    }

    /// `name = None` stores the schema default, "New Conversation".
    pub fn create_conversation(
        &self,
        id: &str,
        user_id: &str,
        name: Option<&str>,
        companion_id: Option<&str>,
    ) -> Result<ConversationRow> {
        self.with_conn_mut(|conn| {
            let row = match name {
                Some(name) => conn.query_row(
                    &format!(
                        "INSERT INTO conversations (id, user_id, name, companion_id)
                         VALUES (?1, ?2, ?3, ?4)
                         RETURNING {CONVERSATION_COLUMNS}"
                    ),
                    rusqlite::params![id, user_id, name, companion_id],
                    conversation_from_row,
                )?,
                None => conn.query_row(
                    &format!(
                        "INSERT INTO conversations (id, user_id, companion_id)
                         VALUES (?1, ?2, ?3)
                         RETURNING {CONVERSATION_COLUMNS}"
                    ),
                    rusqlite::params![id, user_id, companion_id],
                    conversation_from_row,
                )?,
            };
            Ok(row)
        })
    }

    /// Returns `None` when the conversation does not exist or is not the caller's.
    pub fn rename_conversation(
        &self,
        id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<Option<ConversationRow>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE conversations
                     SET name = ?3, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1 AND user_id = ?2
                     RETURNING {CONVERSATION_COLUMNS}"
                ),
                [id, user_id, name],
                conversation_from_row,
            )
            .optional()
        })
    }

    /// Deletes the conversation; its messages go with it (ON DELETE CASCADE).
    pub fn delete_conversation(&self, id: &str, user_id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                &format!(
                    "DELETE FROM conversations WHERE id = ?1 AND user_id = ?2
                     RETURNING {CONVERSATION_COLUMNS}"
                ),
                [id, user_id],
                conversation_from_row,
            )
            .optional()
        })
    }

    // -- Messages --

    /// Store a message and mark its conversation as just active, in one
    /// transaction.
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        role: &str,
        content: &str,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let row = tx.query_row(
                &format!(
                    "INSERT INTO messages (id, conversation_id, role, content)
                     VALUES (?1, ?2, ?3, ?4)
                     RETURNING {MESSAGE_COLUMNS}"
                ),
                [id, conversation_id, role, content],
                message_from_row,
            )?;
            tx.execute(
                "UPDATE conversations
                 SET last_message_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                [conversation_id],
            )?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// All messages of a conversation, oldest first.
    pub fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map([conversation_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The newest `limit` messages, returned oldest first.
    pub fn recent_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM (
                     SELECT {MESSAGE_COLUMNS}, rowid AS seq FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?2
                 )
                 ORDER BY created_at ASC, seq ASC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![conversation_id, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Companions --

    /// Built-in companions first, then the user's own in creation order.
    pub fn list_companions(&self, user_id: &str) -> Result<Vec<CompanionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMPANION_COLUMNS} FROM companions
                 WHERE user_id = 'system' OR user_id = ?1
                 ORDER BY (user_id = 'system') DESC, created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map([user_id], companion_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_companion(&self, id: &str) -> Result<Option<CompanionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COMPANION_COLUMNS} FROM companions WHERE id = ?1"),
                [id],
                companion_from_row,
            )
            .optional()
        })
    }

    /// The seeded assistant, or the oldest remaining built-in companion.
    pub fn default_companion(&self) -> Result<Option<CompanionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {COMPANION_COLUMNS} FROM companions
                     WHERE user_id = 'system'
                     ORDER BY (id = ?1) DESC, created_at ASC
                     LIMIT 1"
                ),
                [DEFAULT_COMPANION_ID],
                companion_from_row,
            )
            .optional()
        })
    }

    pub fn create_companion(
        &self,
        id: &str,
        user_id: &str,
        new: &NewCompanion<'_>,
    ) -> Result<CompanionRow> {
        self.with_conn_mut(|conn| {
            let row = conn.query_row(
                &format!(
                    "INSERT INTO companions
                        (id, user_id, name, description, instructions, seed, image_url,
                         personality, behavior, response_style)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     RETURNING {COMPANION_COLUMNS}"
                ),
                rusqlite::params![
                    id,
                    user_id,
                    new.name,
                    new.description,
                    new.instructions,
                    new.seed,
                    new.image_url,
                    new.personality,
                    new.behavior,
                    new.response_style,
                ],
                companion_from_row,
            )?;
            Ok(row)
        })
    }

    /// Only the owner can update; built-in companions never match.
    pub fn update_companion(
        &self,
        id: &str,
        user_id: &str,
        patch: &CompanionPatch<'_>,
    ) -> Result<Option<CompanionRow>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE companions SET
                        name = COALESCE(?3, name),
                        description = COALESCE(?4, description),
                        instructions = COALESCE(?5, instructions),
                        seed = COALESCE(?6, seed),
                        image_url = COALESCE(?7, image_url),
                        personality = COALESCE(?8, personality),
                        behavior = COALESCE(?9, behavior),
                        response_style = COALESCE(?10, response_style),
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1 AND user_id = ?2 AND user_id <> 'system'
                     RETURNING {COMPANION_COLUMNS}"
                ),
                rusqlite::params![
                    id,
                    user_id,
                    patch.name,
                    patch.description,
                    patch.instructions,
                    patch.seed,
                    patch.image_url,
                    patch.personality,
                    patch.behavior,
                    patch.response_style,
                ],
                companion_from_row,
            )
            .optional()
        })
    }

    pub fn delete_companion(&self, id: &str, user_id: &str) -> Result<Option<CompanionRow>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                &format!(
                    "DELETE FROM companions WHERE id = ?1 AND user_id = ?2 AND user_id <> 'system'
                     RETURNING {COMPANION_COLUMNS}"
                ),
                [id, user_id],
                companion_from_row,
            )
            .optional()
        })
    }

    // -- Preferences --

    pub fn get_preferences(&self, user_id: &str) -> Result<Option<PreferencesRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {PREFERENCES_COLUMNS} FROM user_preferences WHERE user_id = ?1"),
                [user_id],
                preferences_from_row,
            )
            .optional()
        })
    }

    pub fn set_default_companion(
        &self,
        user_id: &str,
        companion_id: Option<&str>,
    ) -> Result<PreferencesRow> {
        self.with_conn_mut(|conn| {
            let row = conn.query_row(
                &format!(
                    "INSERT INTO user_preferences (user_id, default_companion_id) VALUES (?1, ?2)
                     ON CONFLICT(user_id) DO UPDATE SET
                        default_companion_id = excluded.default_companion_id,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     RETURNING {PREFERENCES_COLUMNS}"
                ),
                rusqlite::params![user_id, companion_id],
                preferences_from_row,
            )?;
            Ok(row)
        })
    }

    // -- Images --

    pub fn insert_image(
        &self,
        id: &str,
        user_id: &str,
        conversation_id: Option<&str>,
        url: &str,
        prompt: Option<&str>,
    ) -> Result<ImageRow> {
        self.with_conn_mut(|conn| {
            let row = conn.query_row(
                &format!(
                    "INSERT INTO images (id, user_id, conversation_id, url, prompt)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     RETURNING {IMAGE_COLUMNS}"
                ),
                rusqlite::params![id, user_id, conversation_id, url, prompt],
                image_from_row,
            )?;
            Ok(row)
        })
    }

    /// Newest first.
    pub fn list_images(&self, user_id: &str) -> Result<Vec<ImageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {IMAGE_COLUMNS} FROM images
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], image_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        image_url: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        companion_id: row.get(2)?,
        name: row.get(3)?,
        last_message_at: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        content: row.get(2)?,
        role: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn companion_from_row(row: &Row<'_>) -> rusqlite::Result<CompanionRow> {
    Ok(CompanionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        instructions: row.get(4)?,
        seed: row.get(5)?,
        image_url: row.get(6)?,
        personality: row.get(7)?,
        behavior: row.get(8)?,
        response_style: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn preferences_from_row(row: &Row<'_>) -> rusqlite::Result<PreferencesRow> {
    Ok(PreferencesRow {
        user_id: row.get(0)?,
        default_companion_id: row.get(1)?,
        updated_at: row.get(2)?,
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRow> {
    Ok(ImageRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        conversation_id: row.get(2)?,
        url: row.get(3)?,
        prompt: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
