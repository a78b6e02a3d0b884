// Translation providers
//
// The workflow talks to a `TranslationProvider`. The LLM-backed provider
// chunks the entries and delegates each chunk to a `CompletionClient`:
// - OpenAI: chat completions with a JSON response format
// - Ollama: local generate API with JSON format

pub mod common;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use common::*;
use crate::config::{ProviderKind, TranslateConfig};
use crate::error::{Result, SubmeterError};
use crate::subtitle::SubtitleEntry;

/// Everything a provider needs for one translation run
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub entries: Vec<SubtitleEntry>,
    pub target_language: String,
    pub source_language: Option<String>,
}

/// Main trait for translation operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Translate all entries. The result keeps every entry's index and
    /// timings and replaces only the text.
    async fn translate(&self, request: &TranslationRequest) -> Result<Vec<SubtitleEntry>>;
}

/// Single prompt in, raw model output out
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String>;
}

/// Build the configured provider.
///
/// Fails with a configuration error when the provider's credential is
/// missing: an API key for OpenAI, an endpoint for Ollama.
pub fn build_provider(config: &TranslateConfig) -> Result<Arc<dyn TranslationProvider>> {
    let timeout = Duration::from_secs(config.timeout_secs);

    match config.provider {
        ProviderKind::OpenAi => {
            let api_key = config
                .api_key
                .as_deref()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| SubmeterError::Config("OpenAI API key is not configured".to_string()))?;

            info!("Using OpenAI provider with model {}", config.model);
            let client = openai::OpenAiClient::new(&config.endpoint, &config.model, api_key, timeout)?;
            let provider: Arc<dyn TranslationProvider> = Arc::new(LlmProvider::new(client, config.chunk_size));
            Ok(provider)
        }
        ProviderKind::Ollama => {
            if config.endpoint.trim().is_empty() {
                return Err(SubmeterError::Config("Ollama endpoint is not configured".to_string()));
            }

            info!("Using Ollama provider with model {}", config.model);
            let client = ollama::OllamaClient::new(&config.endpoint, &config.model, timeout)?;
            let provider: Arc<dyn TranslationProvider> = Arc::new(LlmProvider::new(client, config.chunk_size));
            Ok(provider)
        }
    }
}
