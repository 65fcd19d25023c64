use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::info;

use companion_types::api::UpdatePreferencesRequest;
use companion_types::models::{User, UserPreferences};

use crate::companions::visible_companion;
use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// GET /api/user/preferences: a user who never saved preferences gets the
/// empty defaults.
pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user.id.clone();
    let row = run_db(&state, "PREFERENCES_GET", move |db| db.get_preferences(&uid)).await?;

    let prefs = match row {
        Some(row) => convert::preferences(row),
        None => UserPreferences {
            user_id: user.id,
            default_companion_id: None,
            updated_at: user.updated_at,
        },
    };
    Ok(Json(prefs))
}

/// PUT /api/user/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<UpdatePreferencesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(id) = req.default_companion_id {
        visible_companion(&state, id, &user.id).await?;
    }

    let uid = user.id.clone();
    let row = run_db(&state, "PREFERENCES_PUT", move |db| {
        db.set_default_companion(&uid, req.default_companion_id.map(|c| c.to_string()).as_deref())
    })
    .await?;

    info!("Updated preferences for {}", user.id);
    Ok(Json(convert::preferences(row)))
}
