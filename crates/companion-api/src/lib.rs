pub mod auth;
pub mod chat;
pub mod companions;
pub mod conversations;
pub mod convert;
pub mod error;
pub mod images;
pub mod middleware;
pub mod pages;
pub mod preferences;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// All routes. Everything under `/api` requires a session; pages and the
/// health check do their own handling.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/user", get(auth::current_user))
        .route(
            "/api/user/preferences",
            get(preferences::get_preferences).put(preferences::update_preferences),
        )
        .route(
            "/api/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/api/conversations/{id}",
            get(conversations::get_conversation)
                .patch(conversations::rename_conversation)
                .delete(conversations::delete_conversation),
        )
        .route("/api/conversations/{id}/messages", get(conversations::list_messages))
        .route("/api/chat", post(chat::send_message))
        .route(
            "/api/companions",
            get(companions::list_companions).post(companions::create_companion),
        )
        .route(
            "/api/companions/{id}",
            get(companions::get_companion)
                .patch(companions::update_companion)
                .delete(companions::delete_companion),
        )
        .route("/api/images", get(images::list_images))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let pages = Router::new()
        .route("/", get(pages::home))
        .route("/chat", get(pages::chat_page))
        .route("/health", get(pages::health));

    Router::new().merge(api).merge(pages).with_state(state)
}
