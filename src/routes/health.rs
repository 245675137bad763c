use axum::{extract::State, routing::get, Json, Router};

use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        provider: state.llm.provider().to_string(),
        model: state.config.llm.default_model.clone(),
    })
}
