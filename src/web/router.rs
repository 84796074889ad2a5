//! Axum router: maps all URL paths to handlers.

use crate::web::handlers::{
    analyze, api_model, dashboard, document_pdf, export_graph, healthz, viewer,
};
use crate::web::state::{AppState, SharedState};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Files per upload the request body limit is sized for.
pub const MAX_FILES_PER_UPLOAD: usize = 8;

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    // Per-file limits are enforced at intake; this only bounds the whole body.
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_mul(MAX_FILES_PER_UPLOAD)
        .saturating_add(1024 * 1024);
    let shared: SharedState = Arc::new(state);

    Router::new()
        // Pages
        .route("/", get(dashboard))
        .route("/analyze", post(analyze))
        .route("/viewer/{index}", get(viewer))

        // Downloads
        .route("/documents/{index}/pdf", get(document_pdf))
        .route("/export/{format}", get(export_graph))

        // API endpoints
        .route("/api/model", get(api_model))
        .route("/healthz", get(healthz))

        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
