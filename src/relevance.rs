//! Lexical relevance scoring.
//!
//! Relevance here is an approximate keyword-overlap heuristic, not semantic
//! search: no embeddings or vector similarity are involved. The
//! [`RelevanceScorer`] trait is the seam where a semantic scorer could be
//! substituted without changing the store's search contract (ranked hits,
//! scores in `[0, 1]`, zero-score exclusion, `top_k` bound).
//!
//! # Scoring
//!
//! For each query keyword:
//!
//! - `+2 × occurrences` when the keyword appears literally in the chunk.
//! - `+0.5` for every distinct chunk word (3+ letters) that contains the
//!   keyword or is contained by it, rewarding stems and partial matches.
//!
//! The sum is divided by `2 × keyword_count` and capped at `1.0`.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static WORD_3: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("static regex"));
static WORD_4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]{4,}\b").expect("static regex"));

const QUERY_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

const EXPANSION_STOP_WORDS: &[&str] = &[
    "this", "that", "with", "from", "have", "were", "been", "they", "what", "when", "where",
];

/// Keywords extracted from a query by default.
pub const DEFAULT_TOP_KEYWORDS: usize = 10;

/// Pluggable relevance measure used by the store's search.
pub trait RelevanceScorer: Send + Sync {
    /// Extract the query terms that chunks are scored against.
    fn keywords(&self, query: &str) -> Vec<String>;

    /// Score a lower-cased chunk text against `keywords`, in `[0.0, 1.0]`.
    fn score(&self, chunk_text_lower: &str, keywords: &[String]) -> f64;
}

/// The default keyword-frequency scorer.
#[derive(Debug, Clone)]
pub struct KeywordScorer {
    pub top_n: usize,
}

impl Default for KeywordScorer {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_KEYWORDS,
        }
    }
}

impl RelevanceScorer for KeywordScorer {
    fn keywords(&self, query: &str) -> Vec<String> {
        extract_keywords(query, self.top_n)
    }

    fn score(&self, chunk_text_lower: &str, keywords: &[String]) -> f64 {
        score(chunk_text_lower, keywords)
    }
}

/// Extract up to `top_n` query keywords: 3+ letter words minus a small
/// stop-word set, most frequent first, ties in first-seen order.
pub fn extract_keywords(text: &str, top_n: usize) -> Vec<String> {
    top_terms(&WORD_3, QUERY_STOP_WORDS, text, top_n)
}

/// Extract up to `top_n` expansion terms: 4+ letter words minus a
/// different stop-word set.
pub fn extract_expansion_terms(text: &str, top_n: usize) -> Vec<String> {
    top_terms(&WORD_4, EXPANSION_STOP_WORDS, text, top_n)
}

fn top_terms(pattern: &Regex, stop_words: &[&str], text: &str, top_n: usize) -> Vec<String> {
    let lower = text.to_lowercase();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for m in pattern.find_iter(&lower) {
        let word = m.as_str();
        if stop_words.contains(&word) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
        .into_iter()
        .take(top_n)
        .map(str::to_string)
        .collect()
}

/// Score `chunk_text_lower` against `keywords`. Returns `0.0` when no
/// keyword matches, literally or partially.
pub fn score(chunk_text_lower: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }

    let chunk_words: HashSet<&str> = WORD_3
        .find_iter(chunk_text_lower)
        .map(|m| m.as_str())
        .collect();

    let mut total = 0.0;
    for keyword in keywords {
        let occurrences = chunk_text_lower.matches(keyword.as_str()).count();
        total += 2.0 * occurrences as f64;

        for word in &chunk_words {
            if word.contains(keyword.as_str()) || keyword.contains(word) {
                total += 0.5;
            }
        }
    }

    (total / (2.0 * keywords.len() as f64)).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_extract_keywords_drops_short_and_stop_words() {
        let keywords = extract_keywords("The fox and an ox jump over it", 10);
        assert_eq!(keywords, kw(&["fox", "jump", "over"]));
    }

    #[test]
    fn test_extract_keywords_frequency_then_first_seen() {
        let keywords = extract_keywords("beta alpha beta gamma alpha beta delta", 3);
        assert_eq!(keywords, kw(&["beta", "alpha", "gamma"]));
    }

    #[test]
    fn test_extract_keywords_lowercases() {
        assert_eq!(extract_keywords("Rust RUST rust", 10), kw(&["rust"]));
    }

    #[test]
    fn test_extract_keywords_ignores_digits_glued_to_words() {
        assert!(extract_keywords("abc123 x9yz", 10).is_empty());
    }

    #[test]
    fn test_expansion_terms_use_their_own_stop_set() {
        let terms = extract_expansion_terms("this deployment uses that cluster with the cluster", 5);
        assert_eq!(terms, kw(&["cluster", "deployment", "uses"]));
    }

    #[test]
    fn test_fox_scenario() {
        let chunk = "the quick brown fox jumps over the lazy dog.";
        let keywords = extract_keywords("fox jumps", 10);
        assert_eq!(keywords, kw(&["fox", "jumps"]));
        assert!((score(chunk, &keywords) - 1.0).abs() < 1e-9);

        let keywords = extract_keywords("zebra parrot", 10);
        assert_eq!(score(chunk, &keywords), 0.0);
    }

    #[test]
    fn test_partial_score_is_normalized() {
        let s = score("a cat sat", &kw(&["cat", "dog", "bird", "fish"]));
        assert!((s - 0.3125).abs() < 1e-9);
    }

    #[test]
    fn test_partial_match_either_direction() {
        let s = score("we run daily", &kw(&["runners"]));
        assert!((s - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_empty_keywords_score_zero() {
        assert_eq!(score("anything at all", &[]), 0.0);
    }

    #[test]
    fn test_score_capped_at_one() {
        let s = score("rust rust rust rust", &kw(&["rust"]));
        assert_eq!(s, 1.0);
    }

    #[test]
    fn test_scorer_trait_delegates() {
        let scorer = KeywordScorer::default();
        let keywords = scorer.keywords("Quick foxes");
        assert_eq!(keywords, kw(&["quick", "foxes"]));
        assert!(scorer.score("quick brown", &keywords) > 0.0);
    }
}
