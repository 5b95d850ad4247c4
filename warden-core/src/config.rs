//! Configuration types

use crate::{ConfigError, WardenResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 8192;
pub const DEFAULT_SAFE_INPUT_TOKENS: usize = 3000;
pub const DEFAULT_SAFE_OUTPUT_TOKENS: usize = 4096;
pub const DEFAULT_SAFETY_MARGIN: usize = 500;
pub const DEFAULT_MIN_OUTPUT_FLOOR: usize = 1000;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

pub const DEFAULT_WRAPPER_OVERHEAD_TOKENS: usize = 20;
pub const DEFAULT_TRUNCATION_SAFETY_TOKENS: usize = 100;
pub const DEFAULT_TRUNCATION_MARKER: &str = "\n... [truncated]";

// ============================================================================
// MODEL BUDGET
// ============================================================================

/// Token limits of the target model.
///
/// Immutable for the lifetime of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelBudget {
    /// Combined input + output window of the model
    pub max_context_tokens: usize,
    /// Input size under which a single call is attempted
    pub safe_input_tokens: usize,
    /// Upper bound on requested output tokens
    pub safe_output_tokens: usize,
    /// Tokens held back from the window when sizing output
    pub safety_margin: usize,
    /// Lower bound on requested output tokens
    pub min_output_floor: usize,
}

impl Default for ModelBudget {
    fn default() -> Self {
        Self {
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            safe_input_tokens: DEFAULT_SAFE_INPUT_TOKENS,
            safe_output_tokens: DEFAULT_SAFE_OUTPUT_TOKENS,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            min_output_floor: DEFAULT_MIN_OUTPUT_FLOOR,
        }
    }
}

impl ModelBudget {
    /// Create ModelBudget from environment variables.
    ///
    /// # Environment Variables
    /// - `WARDEN_MAX_CONTEXT_TOKENS` (default: 8192)
    /// - `WARDEN_SAFE_INPUT_TOKENS` (default: 3000)
    /// - `WARDEN_SAFE_OUTPUT_TOKENS` (default: 4096)
    /// - `WARDEN_SAFETY_MARGIN` (default: 500)
    /// - `WARDEN_MIN_OUTPUT_FLOOR` (default: 1000)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ModelBudget::from_env`], reading through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str, default: usize| {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            max_context_tokens: read("WARDEN_MAX_CONTEXT_TOKENS", DEFAULT_MAX_CONTEXT_TOKENS),
            safe_input_tokens: read("WARDEN_SAFE_INPUT_TOKENS", DEFAULT_SAFE_INPUT_TOKENS),
            safe_output_tokens: read("WARDEN_SAFE_OUTPUT_TOKENS", DEFAULT_SAFE_OUTPUT_TOKENS),
            safety_margin: read("WARDEN_SAFETY_MARGIN", DEFAULT_SAFETY_MARGIN),
            min_output_floor: read("WARDEN_MIN_OUTPUT_FLOOR", DEFAULT_MIN_OUTPUT_FLOOR),
        }
    }

    /// Validate the budget.
    ///
    /// Validates:
    /// - max_context_tokens > 0
    /// - safe_input_tokens <= max_context_tokens
    /// - min_output_floor <= safe_output_tokens
    pub fn validate(&self) -> WardenResult<()> {
        if self.max_context_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_context_tokens".to_string(),
                value: self.max_context_tokens.to_string(),
                reason: "max_context_tokens must be greater than 0".to_string(),
            }
            .into());
        }

        if self.safe_input_tokens > self.max_context_tokens {
            return Err(ConfigError::InvalidValue {
                field: "safe_input_tokens".to_string(),
                value: self.safe_input_tokens.to_string(),
                reason: "safe_input_tokens must not exceed max_context_tokens".to_string(),
            }
            .into());
        }

        if self.min_output_floor > self.safe_output_tokens {
            return Err(ConfigError::InvalidValue {
                field: "min_output_floor".to_string(),
                value: self.min_output_floor.to_string(),
                reason: "min_output_floor must not exceed safe_output_tokens".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

// ============================================================================
// PACKER CONFIG
// ============================================================================

/// Constants used when bin-packing blocks into chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackerConfig {
    /// Fixed token cost of one block's label and fence markers
    pub wrapper_overhead_tokens: usize,
    /// Headroom kept below the chunk budget when truncating a block
    pub safety_tokens: usize,
    /// Appended to any truncated block text
    pub truncation_marker: String,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            wrapper_overhead_tokens: DEFAULT_WRAPPER_OVERHEAD_TOKENS,
            safety_tokens: DEFAULT_TRUNCATION_SAFETY_TOKENS,
            truncation_marker: DEFAULT_TRUNCATION_MARKER.to_string(),
        }
    }
}

impl PackerConfig {
    /// Override the per-block wrapper overhead.
    pub fn with_wrapper_overhead(mut self, tokens: usize) -> Self {
        self.wrapper_overhead_tokens = tokens;
        self
    }

    /// Override the truncation headroom.
    pub fn with_safety_tokens(mut self, tokens: usize) -> Self {
        self.safety_tokens = tokens;
        self
    }

    /// The marker must fit inside the truncation headroom, otherwise a
    /// truncated block can still overflow its chunk.
    pub fn validate(&self) -> WardenResult<()> {
        let marker_tokens = self.truncation_marker.chars().count() / CHARS_PER_TOKEN;
        if marker_tokens > self.safety_tokens {
            return Err(ConfigError::InvalidValue {
                field: "truncation_marker".to_string(),
                value: self.truncation_marker.clone(),
                reason: format!(
                    "marker costs {} tokens, more than safety_tokens ({})",
                    marker_tokens, self.safety_tokens
                ),
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// PROVIDER CONFIG
// ============================================================================

/// Backend selection and credentials.
///
/// `api_key`, `model` and `base_url` are optional here; the backend factory
/// fills them from the environment or its own defaults.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier, e.g. "anthropic" or "openai"
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            api_key: None,
            model: None,
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Provider id normalized for registry lookup.
    pub fn provider_id(&self) -> String {
        self.provider.trim().to_ascii_lowercase()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl std::fmt::Display for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.provider_id())?;
        if let Some(model) = &self.model {
            write!(f, " ({})", model)?;
        }
        Ok(())
    }
}

// ============================================================================
// FILE CONFIG
// ============================================================================

/// Top-level configuration loaded from a TOML file.
///
/// ```toml
/// call_timeout_ms = 120000
///
/// [provider]
/// provider = "anthropic"
///
/// [budget]
/// safe_input_tokens = 3000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub budget: ModelBudget,
    #[serde(default)]
    pub packer: PackerConfig,
    /// Deadline for each backend call; no deadline when absent
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

impl WardenConfig {
    /// Build a configuration with default budgets for `provider`.
    pub fn for_provider(provider: impl Into<String>) -> Self {
        Self {
            provider: ProviderConfig::new(provider),
            budget: ModelBudget::default(),
            packer: PackerConfig::default(),
            call_timeout_ms: None,
        }
    }

    pub fn from_toml_str(source: &str) -> WardenResult<Self> {
        let config: WardenConfig = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> WardenResult<()> {
        if self.provider.provider.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "provider.provider".to_string(),
            }
            .into());
        }
        if self.call_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "call_timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "call_timeout_ms must be greater than 0".to_string(),
            }
            .into());
        }
        self.budget.validate()?;
        self.packer.validate()
    }
}

// ============================================================================
// TESTS
// ============================================================================
