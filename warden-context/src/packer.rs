//! Greedy chunk packing.
//!
//! Blocks are assigned to chunks in input order, first-fit, never reordered.
//! A block too large to share a chunk with anything is truncated so that it
//! fits on its own.

use crate::{estimate_tokens, truncate_chars, wrapper_tokens};
use tracing::warn;
use warden_core::{Chunk, ContentBlock, PackerConfig, TruncationNotice, CHARS_PER_TOKEN};

/// Result of packing: ordered chunks plus any truncations made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packed {
    pub chunks: Vec<Chunk>,
    pub truncations: Vec<TruncationNotice>,
}

impl Packed {
    pub fn is_truncated(&self) -> bool {
        !self.truncations.is_empty()
    }
}

/// Per-block wrapper cost: the configured overhead, or what rendering the
/// block's label actually costs when that is larger.
pub fn block_overhead_tokens(id: &str, config: &PackerConfig) -> usize {
    config.wrapper_overhead_tokens.max(wrapper_tokens(id))
}

/// Pack `blocks` into chunks of at most `max_tokens_per_chunk` estimated tokens.
///
/// Each block costs `estimate_tokens(text) + overhead`, where `overhead` is
/// [`block_overhead_tokens`]. A block whose cost exceeds
/// `max_tokens_per_chunk - safety_tokens` is cut to
/// `(max_tokens_per_chunk - overhead - safety_tokens) * 4` characters and
/// suffixed with the truncation marker. The current chunk is closed when the
/// next block would overflow it; an empty chunk always takes the block. Empty
/// input yields exactly one empty chunk.
///
/// Never fails. Arithmetic saturates, so any budget up to `usize::MAX` is
/// accepted.
pub fn pack(blocks: &[ContentBlock], max_tokens_per_chunk: usize, config: &PackerConfig) -> Packed {
    let truncate_above = max_tokens_per_chunk.saturating_sub(config.safety_tokens);

    let mut chunks = Vec::new();
    let mut truncations = Vec::new();
    let mut current = Chunk::new();

    for block in blocks {
        let mut block = block.clone();
        let overhead = block_overhead_tokens(&block.id, config);
        let mut cost = estimate_tokens(&block.text).saturating_add(overhead);
        let max_content_chars = max_tokens_per_chunk
            .saturating_sub(overhead)
            .saturating_sub(config.safety_tokens)
            .saturating_mul(CHARS_PER_TOKEN);

        if cost > truncate_above && block.text.chars().count() > max_content_chars {
            let mut text = truncate_chars(&block.text, max_content_chars).to_string();
            text.push_str(&config.truncation_marker);
            block.text = text;

            let truncated_cost = estimate_tokens(&block.text).saturating_add(overhead);
            warn!(
                block_id = %block.id,
                original_tokens = cost,
                truncated_tokens = truncated_cost,
                max_tokens_per_chunk,
                "Block exceeds chunk budget on its own; truncated"
            );
            truncations.push(TruncationNotice {
                block_id: block.id.clone(),
                original_tokens: cost,
                truncated_tokens: truncated_cost,
            });
            cost = truncated_cost;
        }

        if !current.is_empty() && current.estimated_tokens.saturating_add(cost) > max_tokens_per_chunk {
            chunks.push(std::mem::take(&mut current));
        }

        if current.is_empty() && cost > max_tokens_per_chunk {
            warn!(
                block_id = %block.id,
                tokens = cost,
                max_tokens_per_chunk,
                "Block still exceeds chunk budget; placing it alone"
            );
        }
        current.push(block, cost);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.is_empty() {
        chunks.push(Chunk::new());
    }

    Packed {
        chunks,
        truncations,
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::render_blocks;
    use proptest::prelude::*;

    fn arb_blocks() -> impl Strategy<Value = Vec<ContentBlock>> {
        prop::collection::vec(0usize..6000, 0..12).prop_map(|sizes| {
            sizes
                .into_iter()
                .enumerate()
                .map(|(i, chars)| ContentBlock::new(format!("file_{i}.rs"), "y".repeat(chars)))
                .collect()
        })
    }

    fn arb_config() -> impl Strategy<Value = PackerConfig> {
        (0usize..40, 4usize..200).prop_map(|(overhead, safety)| {
            PackerConfig::default()
                .with_wrapper_overhead(overhead)
                .with_safety_tokens(safety)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Every input id appears exactly once, in input order
        #[test]
        fn prop_pack_preserves_ids_and_order(
            blocks in arb_blocks(),
            budget in 300usize..4000,
            config in arb_config(),
        ) {
            let packed = pack(&blocks, budget, &config);
            let flattened: Vec<&str> = packed.chunks.iter().flat_map(|c| c.ids()).collect();
            let expected: Vec<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
            prop_assert_eq!(flattened, expected);
        }

        /// No chunk exceeds the budget, truncated blocks included
        #[test]
        fn prop_pack_respects_budget(
            blocks in arb_blocks(),
            budget in 300usize..4000,
            config in arb_config(),
        ) {
            let packed = pack(&blocks, budget, &config);
            for chunk in &packed.chunks {
                prop_assert!(
                    chunk.estimated_tokens <= budget,
                    "chunk of {} tokens exceeds budget {}",
                    chunk.estimated_tokens,
                    budget
                );
            }
        }

        /// Chunk sizes equal the sum of their block costs
        #[test]
        fn prop_pack_accumulator_matches_contents(
            blocks in arb_blocks(),
            budget in 300usize..4000,
            config in arb_config(),
        ) {
            let packed = pack(&blocks, budget, &config);
            for chunk in &packed.chunks {
                let sum: usize = chunk
                    .blocks
                    .iter()
                    .map(|b| estimate_tokens(&b.text) + block_overhead_tokens(&b.id, &config))
                    .sum();
                prop_assert_eq!(sum, chunk.estimated_tokens);
            }
        }

        /// Rendered chunks fit the budget whatever the id lengths
        #[test]
        fn prop_pack_rendered_chunks_fit(
            sizes in prop::collection::vec((0usize..300, 0usize..2000), 0..20),
            budget in 300usize..4000,
            config in arb_config(),
        ) {
            let blocks: Vec<ContentBlock> = sizes
                .into_iter()
                .enumerate()
                .map(|(i, (id_len, chars))| {
                    ContentBlock::new(format!("{}{}", "d/".repeat(id_len / 2), i), "z".repeat(chars))
                })
                .collect();
            let packed = pack(&blocks, budget, &config);
            for chunk in &packed.chunks {
                let rendered = estimate_tokens(&render_blocks(&chunk.blocks));
                prop_assert!(rendered <= chunk.estimated_tokens);
                if chunk.len() > 1 {
                    prop_assert!(rendered <= budget);
                }
            }
        }

        /// Chunks are never empty unless the input is
        #[test]
        fn prop_pack_no_empty_chunks(
            blocks in arb_blocks(),
            budget in 300usize..4000,
        ) {
            let packed = pack(&blocks, budget, &PackerConfig::default());
            if blocks.is_empty() {
                prop_assert_eq!(packed.chunks.len(), 1);
                prop_assert!(packed.chunks[0].is_empty());
            } else {
                prop_assert!(packed.chunks.iter().all(|c| !c.is_empty()));
            }
        }

        /// Only blocks over the truncation threshold are truncated
        #[test]
        fn prop_pack_truncates_only_oversized(
            blocks in arb_blocks(),
            budget in 300usize..4000,
            config in arb_config(),
        ) {
            let packed = pack(&blocks, budget, &config);
            let threshold = budget.saturating_sub(config.safety_tokens);
            let oversized: Vec<&str> = blocks
                .iter()
                .filter(|b| estimate_tokens(&b.text) + block_overhead_tokens(&b.id, &config) > threshold)
                .map(|b| b.id.as_str())
                .collect();
            let truncated: Vec<&str> = packed.truncations.iter().map(|t| t.block_id.as_str()).collect();
            prop_assert_eq!(truncated, oversized);
        }
    }
}
