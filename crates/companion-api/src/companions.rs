use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use companion_db::models::{CompanionPatch, NewCompanion};
use companion_types::api::{CreateCompanionRequest, UpdateCompanionRequest};
use companion_types::models::{Companion, User};

use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// Load a companion the user may talk to: a built-in one or their own.
pub async fn visible_companion(
    state: &AppState,
    id: Uuid,
    user_id: &str,
) -> Result<Companion, ApiError> {
    let row = run_db(state, "COMPANION_GET", move |db| db.get_companion(&id.to_string()))
        .await?
        .ok_or(ApiError::NotFound)?;

    let companion = convert::companion(row);
    if !companion.is_system() && companion.user_id != user_id {
        return Err(ApiError::NotFound);
    }
    Ok(companion)
}

fn required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// GET /api/companions: built-in companions first, then the caller's own.
pub async fn list_companions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, "COMPANIONS_GET", move |db| db.list_companions(&user.id)).await?;
    Ok(Json(rows.into_iter().map(convert::companion).collect::<Vec<_>>()))
}

/// POST /api/companions
pub async fn create_companion(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateCompanionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    required("Name", &req.name)?;
    required("Instructions", &req.instructions)?;

    let id = Uuid::new_v4();
    let uid = user.id.clone();
    let row = run_db(&state, "COMPANIONS_POST", move |db| {
        db.create_companion(
            &id.to_string(),
            &uid,
            &NewCompanion {
                name: req.name.trim(),
                description: req.description.trim(),
                instructions: req.instructions.trim(),
                seed: req.seed.trim(),
                image_url: req.image_url.trim(),
                personality: req.personality.trim(),
                behavior: req.behavior.trim(),
                response_style: req.response_style.trim(),
            },
        )
    })
    .await?;

    info!("Created companion {} for {}", id, user.id);
    Ok((StatusCode::CREATED, Json(convert::companion(row))))
}

/// GET /api/companions/{id}
pub async fn get_companion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(visible_companion(&state, id, &user.id).await?))
}

/// PATCH /api/companions/{id}: only the owner's companions; built-in ones
/// are read-only and answer 404.
pub async fn update_companion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(req): Json<UpdateCompanionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(name) = &req.name {
        required("Name", name)?;
    }
    if let Some(instructions) = &req.instructions {
        required("Instructions", instructions)?;
    }

    let row = run_db(&state, "COMPANION_PATCH", move |db| {
        let patch = CompanionPatch {
            name: req.name.as_deref().map(str::trim),
            description: req.description.as_deref().map(str::trim),
            instructions: req.instructions.as_deref().map(str::trim),
            seed: req.seed.as_deref().map(str::trim),
            image_url: req.image_url.as_deref().map(str::trim),
            personality: req.personality.as_deref().map(str::trim),
            behavior: req.behavior.as_deref().map(str::trim),
            response_style: req.response_style.as_deref().map(str::trim),
        };
        db.update_companion(&id.to_string(), &user.id, &patch)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(convert::companion(row)))
}

/// DELETE /api/companions/{id}
pub async fn delete_companion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user.id.clone();
    let row = run_db(&state, "COMPANION_DELETE", move |db| {
        db.delete_companion(&id.to_string(), &uid)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    info!("Deleted companion {} for {}", id, user.id);
    Ok(Json(convert::companion(row)))
}
