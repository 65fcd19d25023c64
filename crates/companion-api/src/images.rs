use axum::{Extension, Json, extract::State, response::IntoResponse};

use companion_types::models::User;

use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// GET /api/images: newest first.
pub async fn list_images(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, "IMAGES_GET", move |db| db.list_images(&user.id)).await?;
    Ok(Json(rows.into_iter().map(convert::image).collect::<Vec<_>>()))
}
