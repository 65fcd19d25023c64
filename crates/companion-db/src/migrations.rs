use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Id of the seeded "AI Assistant" companion.
pub const DEFAULT_COMPANION_ID: &str = "00000000-0000-0000-0000-000000000001";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL,
                name        TEXT NOT NULL,
                image_url   TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            -- Identities without an email address are stored with ''.
            CREATE UNIQUE INDEX users_email_index ON users(email) WHERE email <> '';

            CREATE TABLE companions (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                instructions    TEXT NOT NULL,
                seed            TEXT NOT NULL DEFAULT '',
                image_url       TEXT NOT NULL DEFAULT '',
                personality     TEXT NOT NULL DEFAULT 'friendly',
                behavior        TEXT NOT NULL DEFAULT 'balanced',
                response_style  TEXT NOT NULL DEFAULT 'conversational',
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX companions_user_id_index ON companions(user_id);

            CREATE TABLE conversations (
                id               TEXT PRIMARY KEY,
                user_id          TEXT NOT NULL REFERENCES users(id),
                companion_id     TEXT REFERENCES companions(id) ON DELETE SET NULL,
                name             TEXT NOT NULL DEFAULT 'New Conversation',
                last_message_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX conversations_name_index ON conversations(name ASC);
            CREATE INDEX conversations_user_id_index ON conversations(user_id ASC);
            CREATE INDEX conversations_last_message_at_index ON conversations(last_message_at DESC);

            CREATE TABLE messages (
                id               TEXT PRIMARY KEY,
                conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                content          TEXT NOT NULL,
                role             TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX messages_conversation_id_index ON messages(conversation_id ASC);
            CREATE INDEX messages_created_at_index ON messages(created_at DESC);

            CREATE TABLE user_preferences (
                user_id               TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                default_companion_id  TEXT REFERENCES companions(id) ON DELETE SET NULL,
                updated_at            TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE images (
                id               TEXT PRIMARY KEY,
                user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                conversation_id  TEXT REFERENCES conversations(id) ON DELETE SET NULL,
                url              TEXT NOT NULL,
                prompt           TEXT,
                created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX images_user_id_index ON images(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    seed(conn)?;

    info!("Database migrations complete");
    Ok(())
}

/// Built-in owner and companion. Safe to run on every start.
fn seed(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO users (id, email, name, image_url) VALUES ('system', '', 'System', '')",
        [],
    )?;

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO companions
            (id, user_id, name, description, instructions, seed, image_url, personality, behavior, response_style)
         VALUES (?1, 'system', ?2, ?3, ?4, ?5, ?6, 'friendly', 'balanced', 'conversational')",
        rusqlite::params![
            DEFAULT_COMPANION_ID,
            "AI Assistant",
            "A helpful AI assistant that can help you with various tasks.",
            "You are a helpful AI assistant. You help users with their questions and tasks in a friendly and professional manner.",
            "Hello! I'm your AI assistant. How can I help you today?",
            "https://ui-avatars.com/api/?name=AI+Assistant",
        ],
    )?;

    if inserted > 0 {
        info!("Seeded default companion {}", DEFAULT_COMPANION_ID);
    }
    Ok(())
}
