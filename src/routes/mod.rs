//! API Routes
//!
//! - `/api/chat` - Streaming chat with file-aware system prompt
//! - `/api/process-file` - Multipart upload and summarization
//! - `/api/files` - Upload store inspection, removal and CSV visualization
//! - `/api/forwarding` - The summary staged for the next chat turn
//! - `/api/health` - Health check

pub mod chat;
pub mod files;
pub mod forwarding;
pub mod health;
pub mod visualization;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let body_limit = state.config.server.max_upload_bytes;
    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(chat::router(state.clone()))
        .merge(files::router(state.clone()))
        .merge(visualization::router(state.clone()))
        .merge(forwarding::router(state.clone()))
        .merge(health::router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
