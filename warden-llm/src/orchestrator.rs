//! Budget-aware call orchestration
//!
//! Decides whether the context fits one backend call. When it does not, the
//! context is packed into chunks, one call is issued per chunk strictly in
//! order, and a final synthesis call merges the partial results.

use crate::prompts::PromptTemplate;
use crate::{BackendRegistry, TextGenerationBackend};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;
use warden_context::{estimate_tokens, max_output_tokens, pack, render_blocks};
use warden_core::{
    CallResult, ContentBlock, ExecutionMode, ExecutionPlan, LlmError, ModelBudget, PackerConfig,
    TruncationNotice, WardenConfig, WardenResult, CHARS_PER_TOKEN,
};

// ============================================================================
// PHASES
// ============================================================================

/// Orchestration state for one invocation.
///
/// `Idle -> Planning -> SingleCall -> Done`, or
/// `Idle -> Planning -> Chunking -> IssuingChunkCall(1..=N) -> [Synthesizing] -> Done`.
/// Any call step may end in `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Phase {
    #[default]
    Idle,
    Planning,
    SingleCall,
    Chunking { total: usize },
    IssuingChunkCall { index: usize, total: usize },
    Synthesizing { parts: usize },
    Done,
    Error,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Planning => write!(f, "planning"),
            Self::SingleCall => write!(f, "single call"),
            Self::Chunking { total } => write!(f, "chunking into {}", total),
            Self::IssuingChunkCall { index, total } => {
                write!(f, "processing chunk {}/{}", index, total)
            }
            Self::Synthesizing { parts } => write!(f, "synthesizing {} results", parts),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Observer for phase transitions. Purely informational.
pub trait ProgressListener: Send + Sync {
    fn on_phase(&self, run_id: Uuid, phase: &Phase);
}

// ============================================================================
// RUN OUTCOME
// ============================================================================

/// Final answer of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub text: String,
    pub mode: ExecutionMode,
    pub chunk_count: usize,
    /// Chunk calls plus the synthesis call, if any
    pub backend_calls: usize,
    pub truncations: Vec<TruncationNotice>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    /// Whether any context was truncated before it reached the backend.
    pub fn is_degraded(&self) -> bool {
        !self.truncations.is_empty()
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Drives a backend through one or more calls within a [`ModelBudget`].
///
/// Holds only immutable configuration and a shared backend handle, so one
/// orchestrator can serve any number of invocations.
#[derive(Clone)]
pub struct CallOrchestrator {
    backend: Arc<dyn TextGenerationBackend>,
    budget: ModelBudget,
    packer: PackerConfig,
    call_timeout: Option<Duration>,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl CallOrchestrator {
    /// Create an orchestrator with the default packer settings and no
    /// per-call deadline.
    pub fn new(backend: Arc<dyn TextGenerationBackend>, budget: ModelBudget) -> Self {
        Self {
            backend,
            budget,
            packer: PackerConfig::default(),
            call_timeout: None,
            listener: None,
        }
    }

    /// Validate `config`, resolve its backend from `registry` and apply its
    /// budget, packer settings and deadline.
    ///
    /// Fails before any network activity on an unknown provider or a missing
    /// credential.
    pub fn from_config(registry: &BackendRegistry, config: &WardenConfig) -> WardenResult<Self> {
        config.validate()?;
        let backend = registry.resolve(&config.provider)?;

        let mut orchestrator =
            Self::new(backend, config.budget).with_packer_config(config.packer.clone());
        if let Some(timeout) = config.call_timeout() {
            orchestrator = orchestrator.with_call_timeout(timeout);
        }
        Ok(orchestrator)
    }

    pub fn with_packer_config(mut self, packer: PackerConfig) -> Self {
        self.packer = packer;
        self
    }

    /// Bound every backend call by `timeout`. Expiry fails the run.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn budget(&self) -> &ModelBudget {
        &self.budget
    }

    pub fn packer_config(&self) -> &PackerConfig {
        &self.packer
    }

    pub fn provider_id(&self) -> &str {
        self.backend.provider_id()
    }

    /// Input tokens left for context once the template's fixed text is paid for.
    ///
    /// The fixed text is rounded up, so a prompt whose context estimates to
    /// at most this many tokens estimates to at most `safe_input_tokens`.
    pub fn available_for_context(&self, template: &dyn PromptTemplate) -> usize {
        let fixed_tokens = template
            .fixed_text()
            .chars()
            .count()
            .div_ceil(CHARS_PER_TOKEN);
        self.budget.safe_input_tokens.saturating_sub(fixed_tokens)
    }

    /// Choose single or multi-call execution for `blocks`.
    ///
    /// Single mode is chosen when the rendered context fits the available
    /// budget exactly or with room to spare.
    pub fn plan(&self, template: &dyn PromptTemplate, blocks: &[ContentBlock]) -> ExecutionPlan {
        let context_tokens = estimate_tokens(&render_blocks(blocks));
        let available = self.available_for_context(template);

        if context_tokens <= available {
            debug!(context_tokens, available, "Context fits a single call");
            return ExecutionPlan::single(blocks.to_vec(), context_tokens);
        }

        let packed = pack(blocks, available, &self.packer);
        debug!(
            context_tokens,
            available,
            chunks = packed.chunks.len(),
            "Context split across calls"
        );
        ExecutionPlan {
            mode: ExecutionMode::Multi,
            chunks: packed.chunks,
            truncations: packed.truncations,
        }
    }

    /// Produce a single answer for `template` over `blocks`.
    ///
    /// # Returns
    /// * `Ok(RunOutcome)` - The final text with plan details
    /// * `Err(WardenError::Llm)` - The first backend failure; no partial
    ///   output is returned and no later call is attempted
    pub async fn run(
        &self,
        template: &dyn PromptTemplate,
        blocks: &[ContentBlock],
    ) -> WardenResult<RunOutcome> {
        let run_id = Uuid::now_v7();
        let span = info_span!(
            "orchestrate",
            %run_id,
            provider = self.backend.provider_id(),
            blocks = blocks.len()
        );

        async move {
            let started_at = Utc::now();
            self.emit(run_id, Phase::Planning);
            let plan = self.plan(template, blocks);

            if plan.is_truncated() {
                warn!(
                    truncated_blocks = plan.truncations.len(),
                    "Context truncated to fit the budget; the answer may be incomplete"
                );
            }

            match self.execute(run_id, template, &plan).await {
                Ok((text, backend_calls)) => {
                    self.emit(run_id, Phase::Done);
                    info!(mode = %plan.mode, chunks = plan.chunk_count(), backend_calls, "Run complete");
                    Ok(RunOutcome {
                        run_id,
                        text,
                        mode: plan.mode,
                        chunk_count: plan.chunk_count(),
                        backend_calls,
                        truncations: plan.truncations,
                        started_at,
                        finished_at: Utc::now(),
                    })
                }
                Err(e) => {
                    self.emit(run_id, Phase::Error);
                    error!(error = %e, "Run failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Issue the calls for `plan`. Returns the final text and the number of
    /// backend calls made.
    async fn execute(
        &self,
        run_id: Uuid,
        template: &dyn PromptTemplate,
        plan: &ExecutionPlan,
    ) -> WardenResult<(String, usize)> {
        if plan.mode == ExecutionMode::Single {
            self.emit(run_id, Phase::SingleCall);
            let context = plan
                .chunks
                .first()
                .map(|chunk| render_blocks(&chunk.blocks))
                .unwrap_or_default();
            let text = self.call(&template.full_prompt(&context)).await?;
            return Ok((text, 1));
        }

        let total = plan.chunk_count();
        self.emit(run_id, Phase::Chunking { total });

        let mut results = Vec::with_capacity(total);
        for (i, chunk) in plan.chunks.iter().enumerate() {
            let index = i + 1;
            self.emit(run_id, Phase::IssuingChunkCall { index, total });
            info!(chunk = index, total, "processing chunk {}/{}", index, total);

            let prompt = template.chunk_prompt(&render_blocks(&chunk.blocks), index, total);
            let text = self.call(&prompt).await?;
            results.push(CallResult {
                ordinal: index,
                text,
            });
        }

        if results.len() == 1 {
            let text = results.pop().map(|r| r.text).unwrap_or_default();
            return Ok((text, 1));
        }

        self.emit(run_id, Phase::Synthesizing { parts: total });
        info!(parts = total, "Synthesizing chunk results");
        let text = self.call(&template.synthesis_prompt(&results)).await?;
        Ok((text, total + 1))
    }

    /// One backend call sized from the realized prompt.
    async fn call(&self, prompt: &str) -> WardenResult<String> {
        let input_tokens = estimate_tokens(prompt);
        let max_output = max_output_tokens(input_tokens, &self.budget);
        debug!(input_tokens, max_output_tokens = max_output, "Issuing backend call");

        let request = self.backend.generate(prompt, max_output);
        match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, request).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout {
                    provider: self.backend.provider_id().to_string(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }
                .into()),
            },
            None => request.await,
        }
    }

    fn emit(&self, run_id: Uuid, phase: Phase) {
        if let Some(listener) = &self.listener {
            listener.on_phase(run_id, &phase);
        }
    }
}

impl std::fmt::Debug for CallOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOrchestrator")
            .field("provider", &self.backend.provider_id())
            .field("budget", &self.budget)
            .field("packer", &self.packer)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
