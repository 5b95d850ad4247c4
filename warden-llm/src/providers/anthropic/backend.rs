//! Anthropic (Claude) text-generation backend

use super::client::AnthropicClient;
use super::types::{Message, MessageRequest, MessageResponse, ResponseBlock};
use crate::providers::{invalid_response, resolve_api_key};
use crate::TextGenerationBackend;
use async_trait::async_trait;
use tracing::debug;
use warden_core::{ProviderConfig, WardenResult};

/// Anthropic backend using the Messages API.
#[derive(Debug)]
pub struct AnthropicBackend {
    client: AnthropicClient,
    model: String,
}

impl AnthropicBackend {
    pub const PROVIDER_ID: &'static str = "anthropic";
    pub const DEFAULT_MODEL: &'static str = "claude-3-5-sonnet-20241022";
    pub const API_KEY_ENV: &'static str = "ANTHROPIC_API_KEY";
    pub const BASE_URL_ENV: &'static str = "WARDEN_ANTHROPIC_BASE_URL";

    /// Create a new Anthropic backend.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `model` - Model name (e.g., "claude-3-5-sonnet-20241022")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: AnthropicClient::new(api_key),
            model: model.into(),
        }
    }

    /// Create backend with the default Claude 3.5 Sonnet model.
    pub fn with_default_model(api_key: impl Into<String>) -> Self {
        Self::new(api_key, Self::DEFAULT_MODEL)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }

    /// Build from configuration, reading missing values from the process
    /// environment.
    pub fn from_config(config: &ProviderConfig) -> WardenResult<Self> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    /// Build from configuration, reading missing values through `lookup`.
    ///
    /// # Returns
    /// * `Err(ConfigError::MissingRequired)` - If no API key is configured
    pub fn from_config_with<F>(config: &ProviderConfig, lookup: F) -> WardenResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = resolve_api_key(config, Self::API_KEY_ENV, &lookup)?;
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());

        let mut backend = Self::new(api_key, model);
        if let Some(base_url) = config.base_url.clone().or_else(|| lookup(Self::BASE_URL_ENV)) {
            backend = backend.with_base_url(base_url);
        }
        Ok(backend)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Concatenate the text blocks of a reply.
    fn extract_text(content: Vec<ResponseBlock>) -> Option<String> {
        let texts: Vec<String> = content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }
}

#[async_trait]
impl TextGenerationBackend for AnthropicBackend {
    fn provider_id(&self) -> &str {
        Self::PROVIDER_ID
    }

    async fn generate(&self, prompt: &str, max_output_tokens: usize) -> WardenResult<String> {
        let request = MessageRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            max_tokens: max_output_tokens,
        };

        let response: MessageResponse = self.client.request("messages", &request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                provider = Self::PROVIDER_ID,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = ?response.stop_reason,
                "Completion received"
            );
        }

        Self::extract_text(response.content)
            .ok_or_else(|| invalid_response(Self::PROVIDER_ID, "No text content in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{ConfigError, WardenError};

    #[test]
    fn test_from_config_defaults() {
        let config = ProviderConfig::new("anthropic").with_api_key("k");
        let backend = AnthropicBackend::from_config_with(&config, |_| None).unwrap();
        assert_eq!(backend.model(), "claude-3-5-sonnet-20241022");
        assert_eq!(backend.base_url(), "https://api.anthropic.com/v1");
    }

    #[test]
    fn test_from_config_reads_env_lookup() {
        let config = ProviderConfig::new("anthropic").with_model("claude-3-haiku-20240307");
        let backend = AnthropicBackend::from_config_with(&config, |name| match name {
            "ANTHROPIC_API_KEY" => Some("env-key".to_string()),
            "WARDEN_ANTHROPIC_BASE_URL" => Some("http://localhost:8080".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(backend.model(), "claude-3-haiku-20240307");
        assert_eq!(backend.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_from_config_missing_key() {
        let err = AnthropicBackend::from_config_with(&ProviderConfig::new("anthropic"), |_| None)
            .unwrap_err();
        assert!(matches!(
            err,
            WardenError::Config(ConfigError::MissingRequired { ref field }) if field == "ANTHROPIC_API_KEY"
        ));
    }

    #[test]
    fn test_extract_text_skips_other_blocks() {
        let text = AnthropicBackend::extract_text(vec![
            ResponseBlock::Other,
            ResponseBlock::Text { text: "a".into() },
            ResponseBlock::Text { text: "b".into() },
        ]);
        assert_eq!(text.as_deref(), Some("a\nb"));
        assert_eq!(AnthropicBackend::extract_text(vec![ResponseBlock::Other]), None);
    }
}
