use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::files::{classify, FileKind};
use crate::models::AppState;
use crate::routes::files::find_upload;
use crate::types::{AppError, AppResult};
use crate::visualization::{analyze, render_html, stats_csv, CsvAnalysis};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/files/{id}/visualization", get(visualization_page))
        .route("/api/files/{id}/visualization/stats.csv", get(visualization_stats))
        .with_state(state)
}

/// Full CSV text of an upload, analyzed
async fn load_analysis(state: &AppState, id: Uuid) -> AppResult<(String, CsvAnalysis)> {
    let upload = find_upload(state, id).await?;
    let name = upload.file.name.clone();

    if classify(&upload.file) != FileKind::Csv {
        return Err(AppError::Unprocessable(format!("{} is not a CSV file", name)));
    }
    let text = upload
        .file
        .read_text()
        .map_err(|e| AppError::Unprocessable(format!("{} cannot be visualized: {}", name, e)))?;

    let analysis = analyze(text).map_err(|e| {
        warn!(file_id = %id, error = %e, "CSV analysis failed");
        AppError::Unprocessable(format!("{} cannot be visualized: {}", name, e))
    })?;
    debug!(
        file_id = %id,
        rows = analysis.total_rows,
        numeric_columns = analysis.stats.len(),
        "CSV analyzed"
    );
    Ok((name, analysis))
}

async fn visualization_page(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Html<String>> {
    let (name, analysis) = load_analysis(&state, id).await?;
    let document = render_html(&name, &analysis)
        .map_err(|e| AppError::Unprocessable(format!("{} cannot be visualized: {}", name, e)))?;
    Ok(Html(document))
}

async fn visualization_stats(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    let (_, analysis) = load_analysis(&state, id).await?;
    let data = stats_csv(&analysis).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"stats.csv\""),
        ],
        data,
    )
        .into_response())
}
