use axum::{
    Extension, Json,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::debug;

use companion_types::api::Claims;
use companion_types::models::User;

use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// Cookie the auth provider sets for browser sessions.
pub const SESSION_COOKIE: &str = "__session";

/// How session tokens from the auth provider are verified.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Required `iss` claim, if any.
    pub issuer: Option<String>,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            issuer: None,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!("Rejected session token: {}", e);
            ApiError::Unauthorized
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(ApiError::Unauthorized);
        }
        Ok(data.claims)
    }
}

/// Bearer token from `Authorization`, falling back to the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Verify the token and make sure a local user row exists for the identity.
pub async fn authenticate(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = state.auth.verify(token)?;

    let row = run_db(state, "AUTH", move |db| {
        db.get_or_create_user(
            &claims.sub,
            claims.email.as_deref().unwrap_or_default(),
            claims.name.as_deref().unwrap_or_default(),
            claims.image_url.as_deref().unwrap_or_default(),
        )
    })
    .await?;

    Ok(convert::user(row))
}

/// Like [`authenticate`], but anonymous or invalid sessions are just `None`.
pub async fn optional_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = session_token(headers)?;
    authenticate(state, &token).await.ok()
}

/// GET /api/user
pub async fn current_user(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(user)
}
