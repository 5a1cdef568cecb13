//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let max_body = state.config.server.max_upload_bytes;

    Router::new()
        .route("/secure/upload", post(handlers::secure_upload))
        .route(
            "/secure/session/{session_id}/grant",
            post(handlers::grant_and_process),
        )
        .route(
            "/secure/session/{session_id}/status",
            get(handlers::session_status),
        )
        // Health check is intentionally unauthenticated for probes
        .route("/secure/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
