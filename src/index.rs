//! Persistence of the fragment index (`rag/index.json`).
//!
//! The index is a pretty-printed JSON array of `{source, page, content}`
//! objects. Loading validates every entry through [`Fragment`]'s checked
//! deserialization, so a malformed index fails here instead of inside
//! retrieval.

use anyhow::{Context, Result};
use std::path::Path;

use gices_raga_core::models::Fragment;

/// Load the fragment index. A missing file is an empty knowledge base.
pub fn load_index(path: &Path) -> Result<Vec<Fragment>> {
    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            "fragment index not found; run `gices ingest` first"
        );
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fragment index: {}", path.display()))?;
    let fragments: Vec<Fragment> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid fragment index: {}", path.display()))?;

    tracing::debug!(path = %path.display(), fragments = fragments.len(), "loaded fragment index");
    Ok(fragments)
}

/// Write the fragment index, creating parent directories as needed.
pub fn save_index(path: &Path, fragments: &[Fragment]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(fragments)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write fragment index: {}", path.display()))?;
    Ok(())
}
