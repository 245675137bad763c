use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::files::{classify, FileHandle, FileKind};
use crate::models::{AppState, ProcessFileError, ProcessFileResponse};
use crate::pipeline;
use crate::store::UploadedFile;
use crate::types::{AppError, AppResult};
use crate::visualization::analysis_script;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/process-file", post(process_file))
        .route("/api/files", get(list_files))
        .route("/api/files/{id}", get(get_file).delete(delete_file))
        .route("/api/files/{id}/script", get(csv_script))
        .with_state(state)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::InvalidRequest(e.body_text())
    }
}

/// Summarize one uploaded file and stage it for the next chat turn
async fn process_file(State(state): State<AppState>, mut multipart: Multipart) -> AppResult<Response> {
    let mut upload: Option<FileHandle> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("unnamed").to_string();
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| mime_guess::from_path(&name).first_or_octet_stream().essence_str().to_string());
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some(FileHandle::new(name, mime_type, data, Utc::now()));
    }

    let file = upload.ok_or_else(|| AppError::InvalidRequest("No file provided".to_string()))?;
    let name = file.name.clone();
    info!(name = %name, size = file.size, mime_type = %file.mime_type, "Processing uploaded file");

    let report = pipeline::ingest(&state.uploads, &state.station, file).await;

    if let Some(details) = report.outcome.failure {
        warn!(file_id = %report.id, error = %details, "File processing failed");
        let body = ProcessFileError {
            error: "Error processing file".to_string(),
            details: Some(details),
        };
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response());
    }

    Ok(Json(ProcessFileResponse {
        success: true,
        data: report.outcome.payload,
        message: format!("Successfully processed {}", name),
        file_id: report.id,
    })
    .into_response())
}

async fn list_files(State(state): State<AppState>) -> Json<Vec<UploadedFile>> {
    Json(state.uploads.list().await)
}

pub(crate) async fn find_upload(state: &AppState, id: Uuid) -> AppResult<UploadedFile> {
    state
        .uploads
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
}

async fn get_file(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<UploadedFile>> {
    Ok(Json(find_upload(&state, id).await?))
}

async fn delete_file(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !pipeline::discard(&state.uploads, &state.station, id).await {
        return Err(AppError::NotFound(format!("File {} not found", id)));
    }
    info!(file_id = %id, "File removed");
    Ok(StatusCode::NO_CONTENT)
}

/// pandas starter script for a CSV upload
async fn csv_script(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    let upload = find_upload(&state, id).await?;
    if classify(&upload.file) != FileKind::Csv {
        return Err(AppError::Unprocessable(format!("{} is not a CSV file", upload.file.name)));
    }

    let script = analysis_script(&upload.file.name);
    Ok(([(header::CONTENT_TYPE, "text/x-python; charset=utf-8")], script).into_response())
}
