use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;

use crate::models::AppState;
use crate::store::StagedFileSummary;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/forwarding", get(staged_for_chat).delete(clear_staged))
        .with_state(state)
}

/// The payload the next chat turn would carry, or `null` when nothing is staged
async fn staged_for_chat(State(state): State<AppState>) -> Json<Option<StagedFileSummary>> {
    Json(state.station.processed_data_for_chat().await)
}

async fn clear_staged(State(state): State<AppState>) -> StatusCode {
    state.station.clear_processed_files().await;
    info!("Forwarding station cleared");
    StatusCode::NO_CONTENT
}
