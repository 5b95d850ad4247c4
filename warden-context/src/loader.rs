//! Reading files into content blocks.

use std::path::Path;
use tracing::{debug, warn};
use warden_core::ContentBlock;

/// Read `paths` in order into blocks keyed by path.
///
/// Missing or unreadable files are skipped with a warning; loading never
/// fails. Duplicate paths are kept once, at their first position.
pub fn load_blocks<P: AsRef<Path>>(paths: &[P]) -> Vec<ContentBlock> {
    let mut blocks: Vec<ContentBlock> = Vec::with_capacity(paths.len());

    for path in paths {
        let path = path.as_ref();
        let id = path.display().to_string();

        if blocks.iter().any(|b| b.id == id) {
            debug!(path = %id, "Skipping duplicate path");
            continue;
        }

        if !path.exists() {
            warn!(path = %id, "File not found; skipping");
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(text) => blocks.push(ContentBlock::new(id, text)),
            Err(e) => warn!(path = %id, error = %e, "Could not read file; skipping"),
        }
    }

    if blocks.is_empty() && !paths.is_empty() {
        warn!("No readable files; proceeding without codebase context");
    }

    blocks
}
