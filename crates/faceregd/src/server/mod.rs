mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

pub use self::state::AppState;

/// Build the HTTP router. Every route lives under `/api/v1`.
pub fn create_app(state: Arc<AppState>) -> Router {
    let limit = state.upload_limit_bytes;
    let api = Router::new()
        .route("/users", get(api::list_users).post(api::create_user))
        .route("/users/page", get(api::list_users_page))
        .route("/users/search", post(api::search_user))
        .route("/users/detect", post(api::detect_faces))
        .route("/users/{identity_id}", delete(api::delete_user))
        .route("/status", get(api::status));

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}
