//! Keyword extraction for documents and queries.
//!
//! The same routine feeds three consumers: the vocabulary builder (as the
//! per-document term set used for document frequency), the TF-IDF encoder
//! (as term counts), and snippet selection.

use std::collections::HashMap;

/// Default number of keywords kept per text.
pub const DEFAULT_MAX_KEYWORDS: usize = 30;

/// Tokens this short carry no retrieval signal.
const MIN_TOKEN_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "and", "any", "are", "aren",
    "because", "been", "before", "being", "below", "between", "both", "but", "can", "cannot",
    "could", "did", "does", "doing", "don", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "into", "its", "itself", "just", "more", "most", "myself", "nor",
    "not", "now", "off", "once", "only", "other", "our", "ours", "ourselves", "out", "over",
    "own", "same", "she", "should", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through", "too",
    "under", "until", "very", "was", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

fn is_numeric(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
}

/// Lower-cases, strips punctuation and splits on whitespace, then drops
/// short tokens, stop words and pure numbers.
///
/// Punctuation is removed rather than turned into a separator, so
/// "e-mail" and "sign-in" stay single words.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .filter(|t| !is_stop_word(t))
        .filter(|t| !is_numeric(t))
        .map(str::to_string)
        .collect()
}

/// Top `max` terms of `text` with their in-text counts.
///
/// Ordered by count descending; equal counts keep first-occurrence order.
pub fn keyword_counts(text: &str, max: usize) -> Vec<(String, usize)> {
    let mut first_seen: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for token in tokenize(text) {
        let count = counts.entry(token.clone()).or_insert(0);
        if *count == 0 {
            first_seen.push(token);
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = first_seen
        .into_iter()
        .map(|term| {
            let count = counts[&term];
            (term, count)
        })
        .collect();

    // sort_by is stable, so ties stay in first-occurrence order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(max);
    ranked
}

/// Top `max` keywords of `text`, most frequent first.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    keyword_counts(text, max)
        .into_iter()
        .map(|(term, _)| term)
        .collect()
}
