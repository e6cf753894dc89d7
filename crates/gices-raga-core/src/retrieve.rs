//! Keyword-overlap retrieval over an in-memory knowledge base.
//!
//! # Scoring
//!
//! 1. Lower-case the query, split on whitespace, deduplicate into a term set.
//! 2. A fragment's score is the number of distinct terms that occur as a
//!    substring of its lower-cased content (`"risk"` matches `"risky"`).
//! 3. Fragments scoring zero are dropped.
//! 4. Stable sort by score (desc); ties keep knowledge-base order.
//! 5. Truncate to `k`.
//!
//! Terms are not stemmed and punctuation is not stripped: `"risk,"` only
//! matches content that contains `"risk,"` verbatim. A linear scan is used;
//! knowledge bases are tens to hundreds of fragments.

use std::collections::BTreeSet;

use crate::models::Fragment;

/// Number of fragments returned when the caller does not choose.
pub const DEFAULT_TOP_K: usize = 4;

/// Distinct lower-cased whitespace-separated terms of `query`.
pub fn query_terms(query: &str) -> BTreeSet<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Count of `terms` contained in the fragment's lower-cased content.
pub fn score_fragment(terms: &BTreeSet<String>, fragment: &Fragment) -> usize {
    let content_lower = fragment.content().to_lowercase();
    terms
        .iter()
        .filter(|t| content_lower.contains(t.as_str()))
        .count()
}

/// Score every fragment and keep the non-zero ones, best first.
///
/// Exposed so callers can show why a fragment was chosen; [`retrieve`] is
/// this list truncated to `k` without the scores.
pub fn rank<'a>(query: &str, knowledge_base: &'a [Fragment]) -> Vec<(usize, &'a Fragment)> {
    if knowledge_base.is_empty() {
        return Vec::new();
    }

    let terms = query_terms(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &Fragment)> = knowledge_base
        .iter()
        .filter_map(|f| {
            let score = score_fragment(&terms, f);
            (score > 0).then_some((score, f))
        })
        .collect();

    // `sort_by` is stable, which is what keeps ties in input order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
}

/// Return up to `k` fragments most relevant to `query`.
pub fn retrieve<'a>(query: &str, knowledge_base: &'a [Fragment], k: usize) -> Vec<&'a Fragment> {
    let mut ranked = rank(query, knowledge_base);
    ranked.truncate(k);
    ranked.into_iter().map(|(_, f)| f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(source: &str, content: &str) -> Fragment {
        Fragment::new(source, 1, content).unwrap()
    }

    fn sources(results: &[&Fragment]) -> Vec<String> {
        results.iter().map(|f| f.source().to_string()).collect()
    }

    #[test]
    fn test_empty_knowledge_base() {
        assert!(retrieve("anything", &[], DEFAULT_TOP_K).is_empty());
    }

    #[test]
    fn test_no_match() {
        let kb = vec![frag("a.pdf", "alpha beta")];
        assert!(retrieve("gamma delta", &kb, DEFAULT_TOP_K).is_empty());
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let kb = vec![frag("a.pdf", "alpha beta")];
        assert!(retrieve("", &kb, DEFAULT_TOP_K).is_empty());
        assert!(retrieve("   \t ", &kb, DEFAULT_TOP_K).is_empty());
    }

    #[test]
    fn test_top_k_ordering() {
        let kb = vec![
            frag("f1", "restoration of nature with integrity"),
            frag("f2", "nature only"),
            frag("f3", "nature and integrity"),
        ];
        let results = retrieve("restoration nature integrity", &kb, 2);
        assert_eq!(sources(&results), vec!["f1", "f3"]);
    }

    #[test]
    fn test_stable_tie_break() {
        let kb = vec![
            frag("first", "credits permanence"),
            frag("low", "credits"),
            frag("second", "permanence credits"),
            frag("third", "credits and permanence"),
        ];
        let results = retrieve("credits permanence", &kb, 10);
        assert_eq!(sources(&results), vec!["first", "second", "third", "low"]);
    }

    #[test]
    fn test_substring_semantics_one_direction() {
        let long = vec![frag("long", "ecosystem restoration targets")];
        let short = vec![frag("short", "the restor prefix")];
        assert_eq!(retrieve("restor", &long, 4).len(), 1);
        assert!(retrieve("restoration", &short, 4).is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let kb = vec![frag("a.pdf", "Nature Credits ROADMAP")];
        assert_eq!(retrieve("nature ROADMAP", &kb, 4).len(), 1);
    }

    #[test]
    fn test_duplicate_terms_count_once() {
        let kb = vec![frag("dup", "risk risk risk"), frag("two", "risk and permanence")];
        let ranked = rank("risk risk RISK permanence", &kb);
        assert_eq!(ranked[0].0, 2);
        assert_eq!(ranked[0].1.source(), "two");
        assert_eq!(ranked[1].0, 1);
    }

    #[test]
    fn test_punctuation_is_part_of_term() {
        let kb = vec![frag("a.pdf", "financial risk exposure")];
        assert!(retrieve("risk,", &kb, 4).is_empty());
        let kb = vec![frag("b.pdf", "financial risk, exposure")];
        assert_eq!(retrieve("risk,", &kb, 4).len(), 1);
    }

    #[test]
    fn test_k_bounds_result() {
        let kb: Vec<Fragment> = (0..10).map(|i| frag(&format!("f{}", i), "nature")).collect();
        assert_eq!(retrieve("nature", &kb, DEFAULT_TOP_K).len(), 4);
        assert!(retrieve("nature", &kb, 0).is_empty());
        assert_eq!(retrieve("nature", &kb, 50).len(), 10);
    }
}
