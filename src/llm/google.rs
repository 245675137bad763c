// Google Gemini adapter
// Streams `models/{model}:streamGenerateContent?alt=sse`
// API Reference: https://ai.google.dev/api/generate-content

use crate::llm::provider::{ChunkStream, LLMAdapter};
use crate::llm::sse::data_events;
use crate::types::{AppError, AppResult, ChatCompletionRequest, ContentPart, MessageContent, StreamChunk};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

pub struct GoogleAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTools>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystem {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum GeminiPart {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename_all = "camelCase")]
    InlineData { mime_type: String, data: String },
    #[serde(rename_all = "camelCase")]
    FileData { mime_type: String, file_uri: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTools {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize)]
struct FunctionDeclaration {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// Response types
#[derive(Deserialize)]
struct GeminiStreamEvent {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GoogleAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, GEMINI_API_BASE)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn stream_url(&self, model: &str) -> String {
        format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, model)
    }

    fn convert_part(part: &ContentPart) -> GeminiPart {
        match part {
            ContentPart::Text { text } => GeminiPart::Text(text.clone()),
            ContentPart::ImageBase64 { base64, media_type } => GeminiPart::InlineData {
                mime_type: media_type.clone(),
                data: base64.clone(),
            },
            ContentPart::ImageUrl { url, .. } => match split_data_url(url) {
                Some((mime_type, data)) => GeminiPart::InlineData {
                    mime_type: mime_type.to_string(),
                    data: data.to_string(),
                },
                None => GeminiPart::FileData {
                    mime_type: mime_guess::from_path(url)
                        .first_or_octet_stream()
                        .essence_str()
                        .to_string(),
                    file_uri: url.clone(),
                },
            },
        }
    }

    fn convert_parts(content: &MessageContent) -> Vec<GeminiPart> {
        match content {
            MessageContent::Text(text) => vec![GeminiPart::Text(text.clone())],
            MessageContent::Multimodal(parts) => parts.iter().map(Self::convert_part).collect(),
        }
    }

    fn build_request(request: &ChatCompletionRequest) -> GeminiRequest {
        // Gemini has no system role inside `contents`; fold those into systemInstruction
        let mut system_text: Vec<String> = request.system_instruction.iter().cloned().collect();
        let mut contents = Vec::new();
        for msg in &request.messages {
            match msg.role.as_str() {
                "system" => system_text.push(msg.content.joined_text()),
                role => contents.push(GeminiContent {
                    role: gemini_role(role),
                    parts: Self::convert_parts(&msg.content),
                }),
            }
        }

        let system_text: Vec<String> = system_text.into_iter().filter(|s| !s.is_empty()).collect();
        let system_instruction = if system_text.is_empty() {
            None
        } else {
            Some(GeminiSystem {
                parts: vec![GeminiPart::Text(system_text.join("\n"))],
            })
        };

        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![GeminiTools {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|(name, spec)| FunctionDeclaration {
                        name: name.clone(),
                        description: spec.description.clone(),
                        parameters: spec.parameters.clone(),
                    })
                    .collect(),
            }]
        };

        let generation_config = if request.max_tokens.is_some() || request.temperature.is_some() {
            Some(GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            })
        } else {
            None
        };

        GeminiRequest {
            contents,
            system_instruction,
            tools,
            generation_config,
        }
    }
}

fn gemini_role(role: &str) -> &'static str {
    match role {
        "assistant" | "model" => "model",
        _ => "user",
    }
}

/// `data:<mime>;base64,<payload>` into its parts
fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let mime_type = meta.strip_suffix(";base64")?;
    Some((mime_type, data))
}

/// Translate one SSE payload into stream chunks
fn parse_event(payload: &str) -> AppResult<Vec<StreamChunk>> {
    let event: GeminiStreamEvent = serde_json::from_str(payload)
        .map_err(|e| AppError::LLMApi(format!("Failed to parse Gemini event: {}", e)))?;

    let mut chunks = Vec::new();
    for candidate in event.candidates {
        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                    chunks.push(StreamChunk::Text { text });
                }
                if let Some(call) = part.function_call {
                    chunks.push(StreamChunk::ToolCall {
                        name: call.name,
                        arguments: call.args,
                    });
                }
            }
        }
        if let Some(reason) = candidate.finish_reason {
            chunks.push(StreamChunk::Finish { reason });
        }
    }
    Ok(chunks)
}

#[async_trait]
impl LLMAdapter for GoogleAdapter {
    async fn stream_chat(&self, request: &ChatCompletionRequest) -> AppResult<ChunkStream> {
        let body = Self::build_request(request);

        let response = self
            .client
            .post(self.stream_url(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&error_text) {
                return Err(AppError::LLMApi(format!(
                    "Gemini API error ({}): {} (status: {:?})",
                    status, error_response.error.message, error_response.error.status
                )));
            }
            return Err(AppError::LLMApi(format!("Gemini API error ({}): {}", status, error_text)));
        }

        let chunks = data_events(response.bytes_stream())
            .map(|event| match event.and_then(|payload| parse_event(&payload)) {
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
    use crate::types::{LLMMessage, ToolSpec};
    use std::collections::BTreeMap;

    fn history(turns: &[(&str, &str)]) -> Vec<LLMMessage> {
        turns
            .iter()
            .map(|(role, text)| LLMMessage::new(*role, *text))
            .collect()
    }

    fn request(messages: Vec<LLMMessage>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: DEFAULT_MODEL.to_string(),
            messages,
            system_instruction: Some("Be brief.".to_string()),
            tools: BTreeMap::new(),
            max_tokens: None,
            temperature: None,
        }
    }

    #[test]
    fn test_request_shape() {
        let mut req = request(history(&[("user", "hi"), ("assistant", "hello"), ("user", "chart it")]));
        req.tools.insert(
            "renderChart".to_string(),
            ToolSpec {
                description: Some("Draw a chart".to_string()),
                parameters: serde_json::json!({"type": "object"}),
            },
        );
        let body = serde_json::to_value(GoogleAdapter::build_request(&req)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "chart it");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "renderChart");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_system_messages_fold_into_instruction() {
        let req = request(vec![LLMMessage::new("system", "Extra rule."), LLMMessage::user("q")]);
        let body = serde_json::to_value(GoogleAdapter::build_request(&req)).unwrap();
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.\nExtra rule.");
    }

    #[test]
    fn test_image_parts() {
        let part = GoogleAdapter::convert_part(&ContentPart::ImageUrl {
            url: "data:image/png;base64,AAAA".to_string(),
            detail: None,
        });
        let value = serde_json::to_value(part).unwrap();
        assert_eq!(value["inlineData"]["mimeType"], "image/png");
        assert_eq!(value["inlineData"]["data"], "AAAA");

        let remote = GoogleAdapter::convert_part(&ContentPart::ImageUrl {
            url: "https://example.com/plot.jpg".to_string(),
            detail: None,
        });
        let value = serde_json::to_value(remote).unwrap();
        assert_eq!(value["fileData"]["mimeType"], "image/jpeg");
    }

    #[test]
    fn test_parse_event() {
        let chunks = parse_event(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi"},{"functionCall":{"name":"renderChart","args":{"kind":"bar"}}}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Text { text: "Hi".to_string() },
                StreamChunk::ToolCall {
                    name: "renderChart".to_string(),
                    arguments: serde_json::json!({"kind": "bar"}),
                },
                StreamChunk::Finish { reason: "STOP".to_string() },
            ]
        );
        assert!(parse_event("not json").is_err());
    }

    #[tokio::test]
    async fn test_stream_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let body = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel\"}]}}]}\n\n\
                    data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"lo\"}]},\"finishReason\":\"STOP\"}]}\n\n";
        let mock = server
            .mock("POST", "/models/gemini-2.0-flash-001:streamGenerateContent")
            .match_query(mockito::Matcher::UrlEncoded("alt".into(), "sse".into()))
            .match_header("x-goog-api-key", "test-key")
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let adapter = GoogleAdapter::with_base_url("test-key", &server.url());
        let stream = adapter.stream_chat(&request(history(&[("user", "hi")]))).await.unwrap();
        let chunks: Vec<StreamChunk> = stream.map(|c| c.unwrap()).collect().await;

        mock.assert_async().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], StreamChunk::Text { text: "Hel".to_string() });
        assert_eq!(chunks[2], StreamChunk::Finish { reason: "STOP".to_string() });
    }

    #[tokio::test]
    async fn test_upstream_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", mockito::Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"message":"API key not valid","status":"PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        let adapter = GoogleAdapter::with_base_url("bad", &server.url());
        let err = adapter
            .stream_chat(&request(history(&[("user", "hi")])))
            .await
            .err()
            .unwrap();
        match err {
            AppError::LLMApi(msg) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("API key not valid"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
