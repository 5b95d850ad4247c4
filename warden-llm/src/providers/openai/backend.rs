//! OpenAI text-generation backend

use super::client::OpenAIClient;
use super::types::{CompletionRequest, CompletionResponse, Message};
use crate::providers::{invalid_response, resolve_api_key};
use crate::TextGenerationBackend;
use async_trait::async_trait;
use tracing::debug;
use warden_core::{ProviderConfig, WardenResult};

/// OpenAI backend using the chat-completions API.
#[derive(Debug)]
pub struct OpenAIBackend {
    client: OpenAIClient,
    model: String,
}

impl OpenAIBackend {
    pub const PROVIDER_ID: &'static str = "openai";
    pub const DEFAULT_MODEL: &'static str = "gpt-4";
    pub const API_KEY_ENV: &'static str = "OPENAI_API_KEY";
    pub const BASE_URL_ENV: &'static str = "WARDEN_OPENAI_BASE_URL";

    /// Create a new OpenAI backend.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (e.g., "gpt-4", "gpt-4o")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OpenAIClient::new(api_key),
            model: model.into(),
        }
    }

    /// Create backend with the default GPT-4 model.
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
}

#[async_trait]
impl TextGenerationBackend for OpenAIBackend {
    fn provider_id(&self) -> &str {
        Self::PROVIDER_ID
    }

    async fn generate(&self, prompt: &str, max_output_tokens: usize) -> WardenResult<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            max_tokens: max_output_tokens,
        };

        let response: CompletionResponse =
            self.client.request("chat/completions", &request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                provider = Self::PROVIDER_ID,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                "Completion received"
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| invalid_response(Self::PROVIDER_ID, "No message content in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{ConfigError, WardenError};

    #[test]
    fn test_from_config_defaults() {
        let config = ProviderConfig::new("openai").with_api_key("k");
        let backend = OpenAIBackend::from_config_with(&config, |_| None).unwrap();
        assert_eq!(backend.model(), "gpt-4");
        assert_eq!(backend.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_explicit_base_url_beats_env() {
        let config = ProviderConfig::new("openai")
            .with_api_key("k")
            .with_base_url("http://explicit");
        let backend = OpenAIBackend::from_config_with(&config, |_| Some("http://env".to_string()))
            .unwrap();
        assert_eq!(backend.base_url(), "http://explicit");
    }

    #[test]
    fn test_from_config_missing_key() {
        let err =
            OpenAIBackend::from_config_with(&ProviderConfig::new("openai"), |_| None).unwrap_err();
        assert_eq!(
            err,
            WardenError::Config(ConfigError::MissingRequired {
                field: "OPENAI_API_KEY".to_string()
            })
        );
    }
}
