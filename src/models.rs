use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::files::SummaryPayload;
use crate::llm::LLM;
use crate::store::{ForwardingStation, UploadStore};
use crate::types::{AppResult, LLMMessage, ToolSpec};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub uploads: UploadStore,
    pub station: ForwardingStation,
    pub llm: Arc<LLM>,
}

impl AppState {
    /// Fresh stores and an LLM client for the configured provider
    pub fn new(config: Config) -> AppResult<Self> {
        let llm = LLM::from_config(&config.llm)?;
        Ok(Self {
            config,
            uploads: UploadStore::new(),
            station: ForwardingStation::new(),
            llm: Arc::new(llm),
        })
    }
}

// Request/Response DTOs

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<LLMMessage>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub tools: Option<BTreeMap<String, ToolSpec>>,
    #[serde(default)]
    pub options: Option<ChatOptions>,
}

impl ChatRequest {
    pub fn visualizations_enabled(&self) -> bool {
        self.options.as_ref().is_some_and(|o| o.visualizations_enabled)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    #[serde(default)]
    pub visualizations_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFileResponse {
    pub success: bool,
    pub data: SummaryPayload,
    pub message: String,
    pub file_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessFileError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub provider: String,
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_minimal() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
        assert_eq!(request.messages.len(), 1);
        assert!(!request.visualizations_enabled());
        assert!(request.tools.is_none());
    }

    #[test]
    fn test_chat_request_options() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"messages":[],"system":"S","options":{"visualizationsEnabled":true},
                "tools":{"renderChart":{"description":"d","parameters":{"type":"object"}}}}"#,
        )
        .unwrap();
        assert!(request.visualizations_enabled());
        assert_eq!(request.system.as_deref(), Some("S"));
        assert!(request.tools.unwrap().contains_key("renderChart"));
    }

    #[test]
    fn test_app_state_rejects_unknown_provider() {
        let mut config = Config::default();
        config.llm.default_provider = "nope".to_string();
        assert!(AppState::new(config).is_err());
    }
}
