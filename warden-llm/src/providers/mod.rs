//! Text-generation backend implementations
//!
//! Concrete `TextGenerationBackend`s for hosted LLM services, plus the error
//! mapping and credential lookup they share.

pub mod anthropic;
pub mod openai;

pub use anthropic::{AnthropicBackend, AnthropicClient};
pub use openai::{OpenAIBackend, OpenAIClient};

use reqwest::header::HeaderMap;
use warden_core::{ConfigError, LlmError, ProviderConfig, WardenError, WardenResult};

// ============================================================================
// ERROR HELPERS
// ============================================================================

pub(crate) fn request_failed(provider: &str, status: u16, message: impl Into<String>) -> WardenError {
    WardenError::Llm(LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> WardenError {
    WardenError::Llm(LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: u64) -> WardenError {
    WardenError::Llm(LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    })
}

pub(crate) fn invalid_api_key(provider: &str) -> WardenError {
    WardenError::Llm(LlmError::InvalidApiKey {
        provider: provider.to_string(),
    })
}

/// `Retry-After` header in milliseconds. Only the delta-seconds form is read.
pub(crate) fn parse_retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(|seconds| (seconds * 1000.0) as u64)
}

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Resolve the API key: explicit config first, then `env_var` via `lookup`.
///
/// Blank values count as absent.
pub(crate) fn resolve_api_key<F>(config: &ProviderConfig, env_var: &str, lookup: F) -> WardenResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    config
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .or_else(|| lookup(env_var).filter(|key| !key.trim().is_empty()))
        .ok_or_else(|| {
            WardenError::Config(ConfigError::MissingRequired {
                field: env_var.to_string(),
            })
        })
}

/// Join a base URL and endpoint without doubling the slash.
pub(crate) fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
