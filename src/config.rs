use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::LLMProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub google_api_key: String,
    pub openai_api_key: String,
    pub openrouter_api_key: String,
    pub groq_api_key: String,
    pub default_provider: String,
    pub default_model: String,
    /// Overrides the provider's API base (proxies, tests)
    pub base_url: Option<String>,
    pub max_duration_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

impl LLMConfig {
    /// API key for the configured default provider, if one is set
    pub fn active_api_key(&self) -> Option<String> {
        let key = match LLMProvider::from_id(&self.default_provider)? {
            LLMProvider::Google => &self.google_api_key,
            LLMProvider::OpenAI => &self.openai_api_key,
            LLMProvider::OpenRouter => &self.openrouter_api_key,
            LLMProvider::Groq => &self.groq_api_key,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
                cors_allowed_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                max_upload_bytes: 25 * 1024 * 1024,
            },
            llm: LLMConfig {
                google_api_key: String::new(),
                openai_api_key: String::new(),
                openrouter_api_key: String::new(),
                groq_api_key: String::new(),
                default_provider: "google".to_string(),
                default_model: "gemini-2.0-flash-001".to_string(),
                base_url: None,
                max_duration_secs: 30,
            },
            logging: LoggingConfig { log_dir: None },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                    .unwrap_or_else(|_| (25 * 1024 * 1024).to_string())
                    .parse()?,
            },
            llm: LLMConfig {
                google_api_key: env::var("GOOGLE_API_KEY").unwrap_or_default(),
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                openrouter_api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                default_provider: env::var("CHAT_LLM_PROVIDER").unwrap_or_else(|_| "google".to_string()),
                default_model: env::var("CHAT_LLM_MODEL")
                    .unwrap_or_else(|_| "gemini-2.0-flash-001".to_string()),
                base_url: env::var("LLM_BASE_URL").ok().filter(|s| !s.is_empty()),
                max_duration_secs: env::var("CHAT_MAX_DURATION_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            },
            logging: LoggingConfig {
                log_dir: env::var("LOG_DIR").ok().map(PathBuf::from),
            },
        })
    }
}
