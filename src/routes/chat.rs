use std::convert::Infallible;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::post,
    Json, Router,
};
use futures::stream::{BoxStream, StreamExt};
use tracing::{info, warn};

use crate::middleware::FILE_DATA_HEADER;
use crate::models::{AppState, ChatRequest};
use crate::prompt::{compose, PromptFile};
use crate::types::{AppError, AppResult, ChatCompletionRequest, StreamChunk};

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(post_chat))
        .with_state(state)
}

/// Parse the optional `x-file-data` header. Present but unreadable is a client error.
fn file_from_header(headers: &HeaderMap) -> AppResult<Option<PromptFile>> {
    let Some(raw) = headers.get(FILE_DATA_HEADER) else {
        return Ok(None);
    };
    let raw = raw
        .to_str()
        .map_err(|_| AppError::InvalidRequest(format!("{} header is not valid text", FILE_DATA_HEADER)))?;
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| AppError::InvalidRequest(format!("{} header is not a valid file description: {}", FILE_DATA_HEADER, e)))
}

/// SSE splits data on `\r`, `\n` and `\r\n` alike, but `Event::data` only
/// splits on `\n`. Unify line endings so the client rebuilds the same text.
fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn chunk_event(chunk: AppResult<StreamChunk>) -> Event {
    let (event, data) = match chunk {
        Ok(StreamChunk::Text { text }) => ("text", text),
        Ok(StreamChunk::ToolCall { name, arguments }) => {
            let payload = serde_json::json!({ "name": name, "arguments": arguments });
            ("tool-call", payload.to_string())
        }
        Ok(StreamChunk::Finish { reason }) => ("finish", reason),
        Err(e) => {
            warn!(error = %e, "Completion stream failed");
            ("error", e.to_string())
        }
    };
    Event::default().event(event).data(normalize_newlines(&data))
}

pub async fn post_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> AppResult<impl IntoResponse> {
    // The header wins; otherwise fall back to whatever the station has staged
    let file = match file_from_header(&headers)? {
        Some(file) => Some(file),
        None => state
            .station
            .processed_data_for_chat()
            .await
            .map(|staged| PromptFile::from(&staged)),
    };

    let system = compose(
        request.system.as_deref().unwrap_or_default(),
        request.visualizations_enabled(),
        file.as_ref(),
    );

    info!(
        messages = request.messages.len(),
        file = file.as_ref().map(|f| f.name.as_str()).unwrap_or("none"),
        visualizations = request.visualizations_enabled(),
        "Chat request received"
    );

    let completion = ChatCompletionRequest {
        model: state.config.llm.default_model.clone(),
        messages: request.messages,
        system_instruction: Some(system).filter(|s| !s.is_empty()),
        tools: request.tools.unwrap_or_default(),
        max_tokens: None,
        temperature: None,
    };

    let chunks = state.llm.stream_chat(&completion).await?;

    // The stream simply ends once the time budget is spent
    let deadline = tokio::time::sleep(state.config.llm.max_duration());
    let events: EventStream = chunks
        .take_until(deadline)
        .map(|chunk| Ok(chunk_event(chunk)))
        .boxed();

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_absent() {
        assert_eq!(file_from_header(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn test_header_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FILE_DATA_HEADER,
            HeaderValue::from_static(r#"{"name":"sales.csv","type":"text/csv","summary":"CSV file with 3 rows, 2 columns"}"#),
        );
        let file = file_from_header(&headers).unwrap().unwrap();
        assert_eq!(file.name, "sales.csv");
        assert_eq!(file.mime_type, "text/csv");
    }

    #[test]
    fn test_carriage_returns_become_newlines() {
        assert_eq!(normalize_newlines("a,b\r\n1,2\r3,4\n"), "a,b\n1,2\n3,4\n");
        assert_eq!(normalize_newlines("plain"), "plain");
    }

    #[test]
    fn test_malformed_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(FILE_DATA_HEADER, HeaderValue::from_static("{not json"));
        assert!(matches!(file_from_header(&headers), Err(AppError::InvalidRequest(_))));
    }
}
