use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::LLMConfig;
use crate::llm::google::GoogleAdapter;
use crate::llm::openai_compatible::OpenAICompatibleAdapter;
use crate::types::{AppError, AppResult, ChatCompletionRequest, LLMProvider, StreamChunk};

/// Incremental completion output. Ends after a `Finish` chunk or an error.
pub type ChunkStream = BoxStream<'static, AppResult<StreamChunk>>;

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn stream_chat(&self, request: &ChatCompletionRequest) -> AppResult<ChunkStream>;
}

/// Configuration for one LLM provider
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    /// Replaces the provider's public endpoint
    pub base_url: Option<String>,
}

impl From<&LLMConfig> for LLMProviderConfig {
    fn from(config: &LLMConfig) -> Self {
        Self {
            name: config.default_provider.clone(),
            api_key: config.active_api_key().unwrap_or_default(),
            base_url: config.base_url.clone(),
        }
    }
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider: LLMProvider,
    has_key: bool,
}

impl LLM {
    pub fn new(config: LLMProviderConfig) -> AppResult<Self> {
        let provider = LLMProvider::from_id(&config.name)
            .ok_or_else(|| AppError::InvalidRequest(format!("Unsupported provider: {}", config.name)))?;

        let adapter: Box<dyn LLMAdapter> = match (provider, config.base_url.as_deref()) {
            (LLMProvider::Google, Some(base)) => Box::new(GoogleAdapter::with_base_url(&config.api_key, base)),
            (LLMProvider::Google, None) => Box::new(GoogleAdapter::new(&config.api_key)),
            (other, Some(base)) => Box::new(OpenAICompatibleAdapter::new(&config.api_key, base, provider_label(other))),
            (other, None) => Box::new(OpenAICompatibleAdapter::for_provider(other, &config.api_key)),
        };

        Ok(Self {
            adapter,
            provider,
            has_key: !config.api_key.is_empty(),
        })
    }

    pub fn from_config(config: &LLMConfig) -> AppResult<Self> {
        Self::new(LLMProviderConfig::from(config))
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }

    pub async fn stream_chat(&self, request: &ChatCompletionRequest) -> AppResult<ChunkStream> {
        if !self.has_key {
            return Err(AppError::LLMApi(format!("No API key configured for {}", self.provider)));
        }
        self.adapter.stream_chat(request).await
    }
}

fn provider_label(provider: LLMProvider) -> &'static str {
    match provider {
        LLMProvider::Google => "Gemini",
        LLMProvider::OpenAI => "OpenAI",
        LLMProvider::OpenRouter => "OpenRouter",
        LLMProvider::Groq => "Groq",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::LLMMessage;
    use std::collections::BTreeMap;

    fn provider(name: &str, key: &str) -> LLMProviderConfig {
        LLMProviderConfig {
            name: name.to_string(),
            api_key: key.to_string(),
            base_url: None,
        }
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        match LLM::new(provider("anthropic", "k")) {
            Err(AppError::InvalidRequest(msg)) => assert!(msg.contains("anthropic")),
            _ => panic!("expected InvalidRequest"),
        }
    }

    #[test]
    fn test_provider_selection() {
        assert_eq!(LLM::new(provider("gemini", "k")).unwrap().provider(), LLMProvider::Google);
        assert_eq!(LLM::new(provider("groq", "k")).unwrap().provider(), LLMProvider::Groq);
        assert_eq!(LLM::new(provider("openrouter", "k")).unwrap().provider(), LLMProvider::OpenRouter);
    }

    #[test]
    fn test_from_config_uses_active_key() {
        let mut config = Config::default();
        config.llm.default_provider = "openai".to_string();
        config.llm.openai_api_key = "sk-test".to_string();
        let llm = LLM::from_config(&config.llm).unwrap();
        assert_eq!(llm.provider(), LLMProvider::OpenAI);
        assert!(llm.has_key);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let llm = LLM::new(provider("google", "")).unwrap();
        let request = ChatCompletionRequest {
            model: "gemini-2.0-flash-001".to_string(),
            messages: vec![LLMMessage::user("hi")],
            system_instruction: None,
            tools: BTreeMap::new(),
            max_tokens: None,
            temperature: None,
        };
        assert!(matches!(llm.stream_chat(&request).await, Err(AppError::LLMApi(_))));
    }
}
