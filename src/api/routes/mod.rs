//! API routes module

pub mod chat;
pub mod models;

use std::sync::Arc;

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<AppState>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Chat routes
        .nest("/chat", chat::router())
        // Same relay, kept for clients that select a model explicitly
        .nest("/generate", chat::router())
        // Model catalog proxy
        .nest("/models", models::router())
}
