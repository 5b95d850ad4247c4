//! WARDEN Test Utilities
//!
//! Shared test infrastructure for the WARDEN workspace:
//! - Scripted mock backend and progress recorder
//! - Proptest generators for content blocks
//! - Fixtures for common budget scenarios
//! - Assertions on the error taxonomy

pub use warden_core::{
    CallResult, Chunk, ConfigError, ContentBlock, ExecutionMode, ExecutionPlan, LlmError,
    ModelBudget, PackerConfig, ProviderConfig, WardenConfig, WardenError, WardenResult,
};
pub use warden_llm::{Phase, ProgressListener, PromptTemplate, TextGenerationBackend};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// MOCK BACKEND
// ============================================================================

/// One `generate` invocation as seen by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prompt: String,
    pub max_output_tokens: usize,
}

/// Scripted backend for orchestration tests.
///
/// Returns queued responses in order, then `"response {n}"` for call `n`
/// (1-based). Every call is recorded before it succeeds, fails or sleeps.
#[derive(Debug)]
pub struct MockBackend {
    provider: String,
    responses: Mutex<VecDeque<String>>,
    fail_on_call: Option<usize>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_provider("mock")
    }

    pub fn with_provider(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            responses: Mutex::new(VecDeque::new()),
            fail_on_call: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue responses returned by the first calls, in order.
    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.responses).extend(responses.into_iter().map(Into::into));
        self
    }

    /// Fail call `n` (1-based) with `LlmError::Provider`.
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|c| c.prompt.clone()).collect()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerationBackend for MockBackend {
    fn provider_id(&self) -> &str {
        &self.provider
    }

    async fn generate(&self, prompt: &str, max_output_tokens: usize) -> WardenResult<String> {
        let n = {
            let mut calls = lock(&self.calls);
            calls.push(RecordedCall {
                prompt: prompt.to_string(),
                max_output_tokens,
            });
            calls.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_on_call == Some(n) {
            return Err(LlmError::Provider {
                provider: self.provider.clone(),
                message: format!("simulated failure on call {}", n),
            }
            .into());
        }

        let scripted = lock(&self.responses).pop_front();
        Ok(scripted.unwrap_or_else(|| format!("response {}", n)))
    }
}

// ============================================================================
// PROGRESS RECORDER
// ============================================================================

/// Listener that keeps every phase it is shown.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(Uuid, Phase)>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phases(&self) -> Vec<Phase> {
        lock(&self.events).iter().map(|(_, phase)| *phase).collect()
    }

    /// Distinct run ids in first-seen order.
    pub fn run_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for (id, _) in lock(&self.events).iter() {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

impl ProgressListener for RecordingListener {
    fn on_phase(&self, run_id: Uuid, phase: &Phase) {
        lock(&self.events).push((run_id, *phase));
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-writer subscriber filtered by `RUST_LOG`. Safe to call from
/// every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for content blocks.

    use super::*;
    use proptest::prelude::*;

    /// Block text up to `max_chars` characters, ASCII and multi-byte mixed.
    pub fn arb_text(max_chars: usize) -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                8 => proptest::char::range('a', 'z'),
                1 => Just('\n'),
                1 => proptest::char::range('\u{00e0}', '\u{00ff}'),
            ],
            0..=max_chars,
        )
        .prop_map(|chars| chars.into_iter().collect())
    }

    /// Up to `max_blocks` blocks with unique ids `file_{i}.rs`.
    pub fn arb_blocks(
        max_blocks: usize,
        max_chars: usize,
    ) -> impl Strategy<Value = Vec<ContentBlock>> {
        prop::collection::vec(arb_text(max_chars), 0..=max_blocks).prop_map(|texts| {
            texts
                .into_iter()
                .enumerate()
                .map(|(i, text)| ContentBlock::new(format!("file_{}.rs", i), text))
                .collect()
        })
    }

    /// Budget with the invariants `validate()` checks.
    pub fn arb_model_budget() -> impl Strategy<Value = ModelBudget> {
        (1usize..50_000, 0usize..50_000, 0usize..2_000, 0usize..8_000, 0usize..8_000).prop_map(
            |(max_ctx, safe_in, margin, a, b)| ModelBudget {
                max_context_tokens: max_ctx,
                safe_input_tokens: safe_in.min(max_ctx),
                safe_output_tokens: a.max(b),
                safety_margin: margin,
                min_output_floor: a.min(b),
            },
        )
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built inputs for common scenarios.

    use super::*;

    /// Block whose text estimates to exactly `tokens` tokens.
    pub fn block_with_tokens(id: &str, tokens: usize) -> ContentBlock {
        ContentBlock::new(id, "x".repeat(tokens * warden_core::CHARS_PER_TOKEN))
    }

    /// Packer settings with no per-block overhead.
    pub fn zero_overhead_packer() -> PackerConfig {
        PackerConfig::default().with_wrapper_overhead(0)
    }

    /// Budget with `safe_input_tokens` overridden.
    pub fn budget_with_input(safe_input_tokens: usize) -> ModelBudget {
        ModelBudget {
            safe_input_tokens,
            ..ModelBudget::default()
        }
    }

    /// Template whose prompts are the bare context, so `fixed_text()` is
    /// empty and the whole input budget goes to context.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct BareTemplate;

    impl PromptTemplate for BareTemplate {
        fn full_prompt(&self, context: &str) -> String {
            context.to_string()
        }

        fn chunk_prompt(&self, context: &str, index: usize, total: usize) -> String {
            format!("[chunk {}/{}]\n{}", index, total, context)
        }

        fn synthesis_prompt(&self, results: &[CallResult]) -> String {
            results
                .iter()
                .map(|r| format!("[result {}]\n{}", r.ordinal, r.text))
                .collect::<Vec<_>>()
                .join("\n")
        }

        fn fixed_text(&self) -> String {
            String::new()
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on the WARDEN error taxonomy.

    use super::*;

    pub fn assert_llm_error<T: std::fmt::Debug>(result: &WardenResult<T>) {
        assert!(
            matches!(result, Err(WardenError::Llm(_))),
            "Expected LlmError, got: {:?}",
            result
        );
    }

    pub fn assert_config_error<T: std::fmt::Debug>(result: &WardenResult<T>) {
        assert!(
            matches!(result, Err(WardenError::Config(_))),
            "Expected ConfigError, got: {:?}",
            result
        );
    }

    /// Every chunk respects `budget` and no block is lost or reordered.
    pub fn assert_chunks_cover(blocks: &[ContentBlock], chunks: &[Chunk], budget: usize) {
        let ids: Vec<&str> = chunks.iter().flat_map(|c| c.ids()).collect();
        let expected: Vec<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, expected, "chunk ids differ from input ids");
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(
                chunk.estimated_tokens <= budget,
                "chunk {} holds {} tokens, budget {}",
                i + 1,
                chunk.estimated_tokens,
                budget
            );
        }
    }
}
