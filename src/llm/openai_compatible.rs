// OpenAI-compatible chat completions adapter
// Covers OpenAI, OpenRouter and Groq, which share the `/chat/completions`
// streaming wire format and differ only by base URL.

use std::collections::BTreeMap;

use crate::llm::provider::{ChunkStream, LLMAdapter};
use crate::llm::sse::data_events;
use crate::types::{
    AppError, AppResult, ChatCompletionRequest, ContentPart, LLMMessage, LLMProvider, MessageContent, StreamChunk,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

const DONE_SENTINEL: &str = "[DONE]";

pub struct OpenAICompatibleAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    label: &'static str,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: ChatMessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ChatMessageContent {
    Text(String),
    Multimodal(Vec<ChatContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Serialize)]
struct ToolDefinition {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDefinition,
}

#[derive(Serialize)]
struct FunctionDefinition {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Value,
}

// Streaming response types
#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

/// Tool call arguments arrive as string fragments spread over many chunks
#[derive(Debug, Default)]
struct PartialToolCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Default)]
struct StreamState {
    pending: BTreeMap<u32, PartialToolCall>,
    finished: bool,
}

impl StreamState {
    fn handle(&mut self, payload: &str) -> AppResult<Vec<StreamChunk>> {
        if payload.trim() == DONE_SENTINEL {
            let mut chunks = self.flush_tool_calls();
            if !self.finished {
                self.finished = true;
                chunks.push(StreamChunk::Finish { reason: "stop".to_string() });
            }
            return Ok(chunks);
        }

        let chunk: ChatChunk = serde_json::from_str(payload)
            .map_err(|e| AppError::LLMApi(format!("Failed to parse completion chunk: {}", e)))?;

        let mut out = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                out.push(StreamChunk::Text { text });
            }
            for call in choice.delta.tool_calls {
                let entry = self.pending.entry(call.index).or_default();
                if let Some(function) = call.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }
            if let Some(reason) = choice.finish_reason {
                out.extend(self.flush_tool_calls());
                self.finished = true;
                out.push(StreamChunk::Finish { reason });
            }
        }
        Ok(out)
    }

    fn flush_tool_calls(&mut self) -> Vec<StreamChunk> {
        std::mem::take(&mut self.pending)
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| {
                let arguments = if call.arguments.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&call.arguments).unwrap_or(Value::String(call.arguments))
                };
                StreamChunk::ToolCall {
                    name: call.name,
                    arguments,
                }
            })
            .collect()
    }
}

impl OpenAICompatibleAdapter {
    pub fn new(api_key: &str, base_url: &str, label: &'static str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            label,
        }
    }

    /// Adapter pointed at the provider's public endpoint
    pub fn for_provider(provider: LLMProvider, api_key: &str) -> Self {
        match provider {
            LLMProvider::OpenRouter => Self::new(api_key, OPENROUTER_API_BASE, "OpenRouter"),
            LLMProvider::Groq => Self::new(api_key, GROQ_API_BASE, "Groq"),
            _ => Self::new(api_key, OPENAI_API_BASE, "OpenAI"),
        }
    }

    fn convert_message(msg: &LLMMessage) -> ChatMessage {
        let content = match &msg.content {
            MessageContent::Text(text) => ChatMessageContent::Text(text.clone()),
            MessageContent::Multimodal(parts) => ChatMessageContent::Multimodal(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => ChatContentPart::Text { text: text.clone() },
                        ContentPart::ImageUrl { url, detail } => ChatContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: url.clone(),
                                detail: detail.clone(),
                            },
                        },
                        ContentPart::ImageBase64 { base64, media_type } => ChatContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: format!("data:{};base64,{}", media_type, base64),
                                detail: None,
                            },
                        },
                    })
                    .collect(),
            ),
        };

        ChatMessage {
            role: msg.role.clone(),
            content,
        }
    }

    fn build_request(request: &ChatCompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system_instruction.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: ChatMessageContent::Text(system.to_string()),
            });
        }
        messages.extend(request.messages.iter().map(Self::convert_message));

        ChatRequest {
            model: request.model.clone(),
            messages,
            stream: true,
            tools: request
                .tools
                .iter()
                .map(|(name, spec)| ToolDefinition {
                    kind: "function",
                    function: FunctionDefinition {
                        name: name.clone(),
                        description: spec.description.clone(),
                        parameters: spec.parameters.clone(),
                    },
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl LLMAdapter for OpenAICompatibleAdapter {
    async fn stream_chat(&self, request: &ChatCompletionRequest) -> AppResult<ChunkStream> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_request(request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("{} request failed: {}", self.label, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                return Err(AppError::LLMApi(format!(
                    "{} API error ({}): {} (type: {:?})",
                    self.label, status, error_response.error.message, error_response.error.error_type
                )));
            }
            return Err(AppError::LLMApi(format!(
                "{} API error ({}): {}",
                self.label, status, error_text
            )));
        }

        let mut state = StreamState::default();
        let chunks = data_events(response.bytes_stream())
            .map(move |event| match event.and_then(|payload| state.handle(&payload)) {
                Ok(chunks) => chunks.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            })
            .flat_map(stream::iter);

        Ok(chunks.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolSpec;

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![LLMMessage::user("hi")],
            system_instruction: Some("SYSTEM".to_string()),
            tools: BTreeMap::new(),
            max_tokens: Some(256),
            temperature: None,
        }
    }

    #[test]
    fn test_provider_base_urls() {
        assert_eq!(OpenAICompatibleAdapter::for_provider(LLMProvider::OpenAI, "k").base_url, OPENAI_API_BASE);
        assert_eq!(
            OpenAICompatibleAdapter::for_provider(LLMProvider::OpenRouter, "k").base_url,
            OPENROUTER_API_BASE
        );
        assert_eq!(OpenAICompatibleAdapter::for_provider(LLMProvider::Groq, "k").base_url, GROQ_API_BASE);
    }

    #[test]
    fn test_request_shape() {
        let mut req = request();
        req.tools.insert(
            "renderChart".to_string(),
            ToolSpec {
                description: None,
                parameters: serde_json::json!({"type": "object"}),
            },
        );
        let body = serde_json::to_value(OpenAICompatibleAdapter::build_request(&req)).unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "SYSTEM");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "renderChart");
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_tool_call_fragments_are_joined() {
        let mut state = StreamState::default();
        let first = state
            .handle(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","type":"function","function":{"name":"renderChart","arguments":"{\"kind\""}}]}}]}"#)
            .unwrap();
        assert!(first.is_empty());
        let second = state
            .handle(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":":\"bar\"}"}}]},"finish_reason":"tool_calls"}]}"#)
            .unwrap();
        assert_eq!(
            second,
            vec![
                StreamChunk::ToolCall {
                    name: "renderChart".to_string(),
                    arguments: serde_json::json!({"kind": "bar"}),
                },
                StreamChunk::Finish { reason: "tool_calls".to_string() },
            ]
        );
        // The sentinel after an explicit finish adds nothing
        assert!(state.handle("[DONE]").unwrap().is_empty());
    }

    #[test]
    fn test_done_without_finish_reason() {
        let mut state = StreamState::default();
        assert_eq!(
            state.handle(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap(),
            vec![StreamChunk::Text { text: "Hi".to_string() }]
        );
        assert_eq!(
            state.handle("[DONE]").unwrap(),
            vec![StreamChunk::Finish { reason: "stop".to_string() }]
        );
    }

    #[tokio::test]
    async fn test_stream_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let body = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n\
                    data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
                    data: [DONE]\n\n";
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"stream": true})))
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let adapter = OpenAICompatibleAdapter::new("test-key", &server.url(), "OpenAI");
        let chunks: Vec<StreamChunk> = adapter
            .stream_chat(&request())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        mock.assert_async().await;
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Text { text: "Hello".to_string() },
                StreamChunk::Finish { reason: "stop".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn test_upstream_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#)
            .create_async()
            .await;

        let adapter = OpenAICompatibleAdapter::new("bad", &server.url(), "Groq");
        match adapter.stream_chat(&request()).await {
            Err(AppError::LLMApi(msg)) => {
                assert!(msg.starts_with("Groq API error (401"));
                assert!(msg.contains("Incorrect API key provided"));
            }
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("expected an error"),
        }
    }
}
