//! WARDEN Context - Budget Planning
//!
//! Token estimation, output budgeting and chunk packing for prompts whose
//! context may not fit a single backend call.

pub mod loader;
pub mod packer;

pub use loader::load_blocks;
pub use packer::{block_overhead_tokens, pack, Packed};

use warden_core::{ContentBlock, ModelBudget, CHARS_PER_TOKEN};

// ============================================================================
// TOKEN UTILITIES
// ============================================================================

/// Estimate token count for text.
///
/// `floor(chars / 4)`, counting Unicode scalar values. Packing results depend
/// on this exact formula; keep it even where a real tokenizer is available.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Prefix of `text` holding at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

// ============================================================================
// OUTPUT BUDGET
// ============================================================================

/// Output tokens to request for a prompt of `input_tokens`.
///
/// `max_context_tokens - input_tokens - safety_margin`, capped at
/// `safe_output_tokens`. The floor always wins: when the window is already
/// exhausted this still returns `min_output_floor` and leaves rejection to the
/// backend.
///
/// # Arguments
/// * `input_tokens` - Estimated size of the realized prompt
/// * `budget` - Model limits
pub fn max_output_tokens(input_tokens: usize, budget: &ModelBudget) -> usize {
    let reserved = input_tokens.saturating_add(budget.safety_margin);
    let available = budget.max_context_tokens.saturating_sub(reserved);
    available
        .min(budget.safe_output_tokens)
        .max(budget.min_output_floor)
}

// ============================================================================
// BLOCK RENDERING
// ============================================================================

/// Separator between rendered blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Render one block with its label and code fence.
pub fn render_block(block: &ContentBlock) -> String {
    format!("## File: {}\n```\n{}\n```", block.id, block.text)
}

/// Render blocks in order, separated by blank lines.
///
/// An empty collection renders to the empty string.
pub fn render_blocks(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Tokens that rendering adds around a block with this `id`.
///
/// Covers the label, the fences, one separator and the rounding lost when
/// the block's text is estimated on its own, so that summing
/// `estimate_tokens(text) + wrapper_tokens(id)` over a chunk never
/// undercounts `estimate_tokens(&render_blocks(chunk))`.
pub fn wrapper_tokens(id: &str) -> usize {
    let wrapper_chars = render_block(&ContentBlock::new(id, "")).chars().count()
        + BLOCK_SEPARATOR.chars().count()
        + (CHARS_PER_TOKEN - 1);
    wrapper_chars.div_ceil(CHARS_PER_TOKEN)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_tokens_floors() {
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("hello world"), 2);
    }

    #[test]
    fn test_estimate_tokens_counts_chars_not_bytes() {
        // 4 characters, 8 bytes
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_max_output_tokens_within_window() {
        let budget = ModelBudget::default();
        // 8192 - 2000 - 500 = 5692, capped at 4096
        assert_eq!(max_output_tokens(2000, &budget), 4096);
        // 8192 - 5000 - 500 = 2692
        assert_eq!(max_output_tokens(5000, &budget), 2692);
    }

    #[test]
    fn test_max_output_tokens_negative_availability_uses_floor() {
        let budget = ModelBudget::default();
        assert_eq!(max_output_tokens(9000, &budget), 1000);
        assert_eq!(max_output_tokens(usize::MAX, &budget), 1000);
    }

    #[test]
    fn test_max_output_tokens_floor_boundary() {
        let budget = ModelBudget::default();
        // 8192 - 500 - 1000 = 6692 leaves exactly the floor
        assert_eq!(max_output_tokens(6692, &budget), 1000);
        assert_eq!(max_output_tokens(6691, &budget), 1001);
    }

    #[test]
    fn test_render_block_format() {
        let block = ContentBlock::new("src/lib.rs", "pub fn f() {}");
        assert_eq!(
            render_block(&block),
            "## File: src/lib.rs\n```\npub fn f() {}\n```"
        );
    }

    #[test]
    fn test_wrapper_tokens_grow_with_id() {
        // 18 fixed chars + id + 2 separator + 3 rounding
        assert_eq!(wrapper_tokens("a"), 6);
        assert_eq!(wrapper_tokens("a.rs"), 7);
        assert_eq!(wrapper_tokens(&"p".repeat(220)), 61);
    }

    #[test]
    fn test_render_blocks_empty() {
        assert_eq!(render_blocks(&[]), "");
    }

    #[test]
    fn test_render_blocks_preserves_order() {
        let blocks = vec![ContentBlock::new("b", "2"), ContentBlock::new("a", "1")];
        let rendered = render_blocks(&blocks);
        let b = rendered.find("## File: b").unwrap();
        let a = rendered.find("## File: a").unwrap();
        assert!(b < a);
        assert!(rendered.contains("```\n\n## File: a"));
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
