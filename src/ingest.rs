//! PDF ingestion: normative documents to page-scoped [`Fragment`]s.
//!
//! Each PDF page becomes at most one fragment. Page text has newlines
//! collapsed to spaces and is trimmed; pages whose text is not longer than
//! `min_chars` characters (headers, blank pages, figure captions) are
//! dropped. A PDF that cannot be parsed is logged and skipped so one broken
//! file does not block the rest of the library.

use anyhow::{Context, Result};
use std::path::Path;
use walkdir::WalkDir;

use gices_raga_core::models::Fragment;

use crate::config::Config;
use crate::index;

/// PDF extraction error. The ingest loop logs these and skips the file.
#[derive(Debug)]
pub enum ExtractError {
    Io(String),
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io(e) => write!(f, "could not read PDF: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract plain text per page, in page order.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Turn extracted page texts into fragments attributed to `source`.
///
/// Page numbers are 1-based positions in `pages`, so skipped pages leave
/// gaps rather than renumbering the ones that follow.
pub fn page_fragments(source: &str, pages: &[String], min_chars: usize) -> Vec<Fragment> {
    pages
        .iter()
        .enumerate()
        .filter_map(|(i, text)| {
            let cleaned = text.replace('\n', " ");
            let cleaned = cleaned.trim();
            if cleaned.chars().count() <= min_chars {
                return None;
            }
            let page = u32::try_from(i + 1).ok()?;
            Fragment::new(source, page, cleaned).ok()
        })
        .collect()
}

/// Read every `*.pdf` directly inside `dir` and return their fragments.
///
/// Files are processed in file-name order so the resulting index, and
/// therefore retrieval tie-breaking, is stable across runs. A missing
/// directory yields no fragments.
pub fn ingest_pdfs(dir: &Path, min_chars: usize) -> Result<Vec<Fragment>> {
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "knowledge base directory does not exist");
        return Ok(Vec::new());
    }

    let mut fragments = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if !entry.file_type().is_file() || !is_pdf(entry.path()) {
            continue;
        }

        let source = entry.file_name().to_string_lossy().to_string();
        match read_pdf(entry.path()) {
            Ok(pages) => {
                let found = page_fragments(&source, &pages, min_chars);
                tracing::info!(
                    source = %source,
                    pages = pages.len(),
                    fragments = found.len(),
                    "ingested PDF"
                );
                fragments.extend(found);
            }
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "skipping unreadable PDF");
            }
        }
    }

    Ok(fragments)
}

fn read_pdf(path: &Path) -> Result<Vec<String>, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    extract_pdf_pages(&bytes)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// CLI entry point: ingest the configured PDF directory and write the index.
pub fn run_ingest(config: &Config) -> Result<()> {
    let knowledge = &config.knowledge;
    let fragments = ingest_pdfs(&knowledge.pdf_dir, knowledge.min_fragment_chars)?;

    if fragments.is_empty() {
        println!("No fragments found in {}", knowledge.pdf_dir.display());
        println!("  Add the normative PDFs to this directory and re-run.");
        return Ok(());
    }

    index::save_index(&knowledge.index_path, &fragments)?;
    println!("Ingestion complete. {} fragments indexed.", fragments.len());
    println!("  index: {}", knowledge.index_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text(word: &str) -> String {
        std::iter::repeat(word).take(40).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_short_pages_are_dropped() {
        let pages = vec!["too short".to_string(), long_text("restoration")];
        let fragments = page_fragments("reg.pdf", &pages, 100);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].page(), 2);
        assert_eq!(fragments[0].source(), "reg.pdf");
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let exactly = "x".repeat(100);
        let one_more = "x".repeat(101);
        assert!(page_fragments("a.pdf", &[exactly], 100).is_empty());
        assert_eq!(page_fragments("a.pdf", &[one_more], 100).len(), 1);
    }

    #[test]
    fn test_newlines_collapsed_and_trimmed() {
        let text = format!("\n  {}\nsecond line\n", long_text("nature"));
        let fragments = page_fragments("a.pdf", &[text], 10);
        let content = fragments[0].content();
        assert!(!content.contains('\n'));
        assert!(content.starts_with("nature"));
        assert!(content.ends_with("second line"));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 60 two-byte characters: 120 bytes but only 60 chars.
        let text = "é".repeat(60);
        assert!(page_fragments("a.pdf", &[text], 100).is_empty());
    }

    #[test]
    fn test_missing_dir_yields_nothing() {
        let fragments = ingest_pdfs(Path::new("/no/such/knowledge_base"), 100).unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_invalid_pdf_is_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("broken.pdf"), b"not a pdf").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), long_text("ignored")).unwrap();
        let fragments = ingest_pdfs(tmp.path(), 100).unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = extract_pdf_pages(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
