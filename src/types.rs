// Type definitions and enums

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    Google,
    OpenAI,
    OpenRouter,
    Groq,
}

impl LLMProvider {
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Some(LLMProvider::Google),
            "openai" => Some(LLMProvider::OpenAI),
            "openrouter" => Some(LLMProvider::OpenRouter),
            "groq" => Some(LLMProvider::Groq),
            _ => None,
        }
    }
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::Google => write!(f, "google"),
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Groq => write!(f, "groq"),
        }
    }
}

/// Content part for multimodal messages (text, images, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>, // "low", "high", or "auto"
    },
    #[serde(rename = "image_base64")]
    ImageBase64 {
        base64: String,
        media_type: String, // e.g., "image/jpeg", "image/png"
    },
}

/// Message content - can be simple text or multimodal (text + images)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Multimodal(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of every text part
    pub fn joined_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Multimodal(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: MessageContent,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new("user", content)
    }
}

/// A client-side tool the model may call. `parameters` is a JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "empty_schema")]
    pub parameters: serde_json::Value,
}

fn empty_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub system_instruction: Option<String>,
    pub tools: BTreeMap<String, ToolSpec>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// One incremental piece of a streamed completion
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamChunk {
    Text { text: String },
    ToolCall { name: String, arguments: serde_json::Value },
    Finish { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::LLMApi(format!("request failed: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::LLMApi(msg) => {
                tracing::error!(error = %msg, "Upstream LLM call failed");
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_ids() {
        assert_eq!(LLMProvider::from_id("google"), Some(LLMProvider::Google));
        assert_eq!(LLMProvider::from_id("Gemini"), Some(LLMProvider::Google));
        assert_eq!(LLMProvider::from_id("groq"), Some(LLMProvider::Groq));
        assert_eq!(LLMProvider::from_id("anthropic"), None);
        assert_eq!(LLMProvider::OpenRouter.to_string(), "openrouter");
    }

    #[test]
    fn test_message_content_accepts_both_shapes() {
        let plain: LLMMessage =
            serde_json::from_value(serde_json::json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(plain.content, MessageContent::Text("hi".into()));

        let parts: LLMMessage = serde_json::from_value(serde_json::json!({
            "role": "user",
            "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]
        }))
        .unwrap();
        assert_eq!(parts.content.joined_text(), "a\nb");
    }

    #[test]
    fn test_tool_spec_defaults_schema() {
        let tool: ToolSpec = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(tool.parameters["type"], "object");
    }
}
