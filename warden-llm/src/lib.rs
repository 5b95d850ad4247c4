//! WARDEN LLM - Backends and Orchestration
//!
//! Defines the text-generation capability every provider implements, an
//! explicit registry that maps provider ids to backend constructors, the
//! prompt templates, and the orchestrator that drives one or more backend
//! calls within the model's token budget.

pub mod orchestrator;
pub mod prompts;
pub mod providers;

pub use orchestrator::{CallOrchestrator, Phase, ProgressListener, RunOutcome};
pub use prompts::{GenerateRulePrompt, PromptTemplate, RunRulePrompt};
pub use providers::{AnthropicBackend, OpenAIBackend};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use warden_core::{ConfigError, ProviderConfig, WardenResult};

// ============================================================================
// TEXT GENERATION BACKEND
// ============================================================================

/// Stateless request/response text generation.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct MyBackend { /* ... */ }
///
/// #[async_trait]
/// impl TextGenerationBackend for MyBackend {
///     fn provider_id(&self) -> &str { "mine" }
///
///     async fn generate(&self, prompt: &str, max_output_tokens: usize) -> WardenResult<String> {
///         // Call the provider
///     }
/// }
/// ```
#[async_trait]
pub trait TextGenerationBackend: Send + Sync {
    /// Identifier used in errors and logs (e.g. "anthropic").
    fn provider_id(&self) -> &str;

    /// Generate a completion for `prompt`.
    ///
    /// # Arguments
    /// * `prompt` - Full prompt text, sent as one user message
    /// * `max_output_tokens` - Upper bound on generated tokens
    ///
    /// # Returns
    /// * `Ok(String)` - The generated text
    /// * `Err(WardenError::Llm)` - On authentication, quota, transport or
    ///   response-format failure
    async fn generate(&self, prompt: &str, max_output_tokens: usize) -> WardenResult<String>;
}

// ============================================================================
// BACKEND REGISTRY
// ============================================================================

/// Constructor for a backend from its configuration.
pub type BackendFactory =
    Arc<dyn Fn(&ProviderConfig) -> WardenResult<Arc<dyn TextGenerationBackend>> + Send + Sync>;

/// Registry of available backends.
/// Backends must be explicitly registered - no auto-discovery.
///
/// # Example
/// ```ignore
/// let registry = BackendRegistry::with_defaults();
/// let backend = registry.resolve(&ProviderConfig::new("anthropic"))?;
/// ```
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in Anthropic and OpenAI backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(AnthropicBackend::PROVIDER_ID, |config: &ProviderConfig| {
            let backend: Arc<dyn TextGenerationBackend> =
                Arc::new(AnthropicBackend::from_config(config)?);
            Ok(backend)
        });
        registry.register(OpenAIBackend::PROVIDER_ID, |config: &ProviderConfig| {
            let backend: Arc<dyn TextGenerationBackend> =
                Arc::new(OpenAIBackend::from_config(config)?);
            Ok(backend)
        });
        registry
    }

    /// Register a factory under `provider_id`.
    /// Replaces any factory previously registered under the same id.
    pub fn register<F>(&mut self, provider_id: impl Into<String>, factory: F)
    where
        F: Fn(&ProviderConfig) -> WardenResult<Arc<dyn TextGenerationBackend>>
            + Send
            + Sync
            + 'static,
    {
        let id = provider_id.into().trim().to_ascii_lowercase();
        self.factories.insert(id, Arc::new(factory));
    }

    /// Check whether a provider id is registered.
    pub fn contains(&self, provider_id: &str) -> bool {
        self.factories
            .contains_key(&provider_id.trim().to_ascii_lowercase())
    }

    /// Registered provider ids, sorted.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Construct the backend named by `config`.
    ///
    /// Performs no network activity.
    ///
    /// # Returns
    /// * `Ok(Arc<dyn TextGenerationBackend>)` - The constructed backend
    /// * `Err(ConfigError::ProviderNotSupported)` - If the id is not registered
    /// * `Err(ConfigError::MissingRequired)` - If the factory lacks a credential
    pub fn resolve(&self, config: &ProviderConfig) -> WardenResult<Arc<dyn TextGenerationBackend>> {
        let id = config.provider_id();
        let factory = self
            .factories
            .get(&id)
            .ok_or_else(|| ConfigError::ProviderNotSupported {
                provider: config.provider.clone(),
            })?;
        debug!(provider = %id, "Resolving backend");
        factory(config)
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("providers", &self.provider_ids())
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
