//! Database row types. These map directly to SQLite rows; ids and timestamps
//! stay as the stored text and are parsed at the API boundary.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub image_url: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub user_id: String,
    pub companion_id: Option<String>,
    pub name: String,
    pub last_message_at: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub content: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CompanionRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub seed: String,
    pub image_url: String,
    pub personality: String,
    pub behavior: String,
    pub response_style: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct PreferencesRow {
    pub user_id: String,
    pub default_companion_id: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ImageRow {
    pub id: String,
    pub user_id: String,
    pub conversation_id: Option<String>,
    pub url: String,
    pub prompt: Option<String>,
    pub created_at: String,
}

/// Persona fields for a new companion.
#[derive(Debug, Clone, Default)]
pub struct NewCompanion<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub instructions: &'a str,
    pub seed: &'a str,
    pub image_url: &'a str,
    pub personality: &'a str,
    pub behavior: &'a str,
    pub response_style: &'a str,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct CompanionPatch<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub instructions: Option<&'a str>,
    pub seed: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub personality: Option<&'a str>,
    pub behavior: Option<&'a str>,
    pub response_style: Option<&'a str>,
}
