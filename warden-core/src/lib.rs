//! WARDEN Core - Data Types
//!
//! Pure data structures shared by the planning and orchestration crates:
//! content blocks, chunks, execution plans, call results, errors and
//! configuration. No I/O happens here.

pub mod config;
pub mod error;

pub use config::*;
pub use error::*;

use serde::{Deserialize, Serialize};

// ============================================================================
// CONTENT BLOCK
// ============================================================================

/// One named unit of input context, typically a source file.
///
/// Identity is the id. Position in the input collection is significant and
/// preserved through packing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Identifier, e.g. a file path
    pub id: String,
    /// Raw text
    pub text: String,
}

impl ContentBlock {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for ContentBlock {
    fn from((id, text): (K, V)) -> Self {
        Self::new(id, text)
    }
}

// ============================================================================
// CHUNK
// ============================================================================

/// Ordered group of blocks sized to fit one backend call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Blocks in input order
    pub blocks: Vec<ContentBlock>,
    /// Sum of each block's estimate plus its wrapper overhead
    pub estimated_tokens: usize,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block whose estimated cost is `tokens`.
    pub fn push(&mut self, block: ContentBlock, tokens: usize) {
        self.estimated_tokens = self.estimated_tokens.saturating_add(tokens);
        self.blocks.push(block);
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Block ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.id.as_str())
    }
}

// ============================================================================
// TRUNCATION NOTICE
// ============================================================================

/// Record of a block cut down to fit a chunk on its own.
///
/// Truncation degrades the data sent to the backend but is not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationNotice {
    /// Id of the truncated block
    pub block_id: String,
    /// Estimated tokens before truncation, wrapper overhead included
    pub original_tokens: usize,
    /// Estimated tokens after truncation, wrapper overhead included
    pub truncated_tokens: usize,
}

// ============================================================================
// EXECUTION PLAN
// ============================================================================

/// Whether an invocation needs one backend call or several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Full context fits one call
    Single,
    /// Context is split into chunks, one call each
    Multi,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multi => "multi",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chosen mode plus the ordered chunks to send.
///
/// Computed once per invocation and consumed immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub mode: ExecutionMode,
    pub chunks: Vec<Chunk>,
    /// Blocks truncated while packing, in input order
    pub truncations: Vec<TruncationNotice>,
}

impl ExecutionPlan {
    /// Plan holding every block in one chunk.
    pub fn single(blocks: Vec<ContentBlock>, estimated_tokens: usize) -> Self {
        Self {
            mode: ExecutionMode::Single,
            chunks: vec![Chunk {
                blocks,
                estimated_tokens,
            }],
            truncations: Vec::new(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Whether any block lost content while packing.
    pub fn is_truncated(&self) -> bool {
        !self.truncations.is_empty()
    }
}

// ============================================================================
// CALL RESULT
// ============================================================================

/// Output of one chunk call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResult {
    /// 1-based position among chunk calls
    pub ordinal: usize,
    pub text: String,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_block_from_tuple() {
        let block: ContentBlock = ("src/main.rs", "fn main() {}").into();
        assert_eq!(block.id, "src/main.rs");
        assert_eq!(block.text, "fn main() {}");
    }

    #[test]
    fn test_chunk_push_accumulates() {
        let mut chunk = Chunk::new();
        assert!(chunk.is_empty());
        chunk.push(ContentBlock::new("a", "x"), 7);
        chunk.push(ContentBlock::new("b", "y"), 5);
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.estimated_tokens, 12);
        assert_eq!(chunk.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_execution_plan_single() {
        let plan = ExecutionPlan::single(vec![ContentBlock::new("a", "x")], 3);
        assert_eq!(plan.mode, ExecutionMode::Single);
        assert_eq!(plan.chunk_count(), 1);
        assert!(!plan.is_truncated());
    }

    #[test]
    fn test_execution_mode_display() {
        assert_eq!(ExecutionMode::Single.to_string(), "single");
        assert_eq!(ExecutionMode::Multi.to_string(), "multi");
    }
}
