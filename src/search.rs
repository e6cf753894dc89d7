//! `gices retrieve`: query the fragment index from the command line.

use anyhow::Result;

use gices_raga_core::retrieve::{rank, retrieve};

use crate::config::Config;
use crate::index;

/// Width of the content excerpt printed per result.
const SNIPPET_CHARS: usize = 240;

pub fn run_search(config: &Config, query: &str, k: Option<usize>, explain: bool) -> Result<()> {
    let knowledge_base = index::load_index(&config.knowledge.index_path)?;
    let k = k.unwrap_or(config.retrieval.top_k);

    if knowledge_base.is_empty() {
        println!("Knowledge base is empty.");
        return Ok(());
    }

    if explain {
        let ranked = rank(query, &knowledge_base);
        if ranked.is_empty() {
            println!("No results.");
            return Ok(());
        }
        for (i, (score, fragment)) in ranked.iter().take(k).enumerate() {
            println!(
                "{}. [score {}] {} p.{}",
                i + 1,
                score,
                fragment.source(),
                fragment.page()
            );
            println!("   {}", snippet(fragment.content()));
        }
        return Ok(());
    }

    let results = retrieve(query, &knowledge_base, k);
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, fragment) in results.iter().enumerate() {
        println!("{}. {} p.{}", i + 1, fragment.source(), fragment.page());
        println!("   {}", snippet(fragment.content()));
    }
    Ok(())
}

fn snippet(content: &str) -> String {
    let mut out: String = content.chars().take(SNIPPET_CHARS).collect();
    if content.chars().count() > SNIPPET_CHARS {
        out.push_str("...");
    }
    out
}
