//! Bounded vocabulary built from per-document keyword sets.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Default minimum number of documents a term must appear in.
pub const DEFAULT_MIN_DOCUMENT_FREQUENCY: usize = 2;

/// Mapping from term to a dense vector slot in `[0, dimension)`.
///
/// Terms outside the vocabulary are dropped from every vector. When fewer
/// than `dimension` terms qualify, the trailing slots are never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Terms in slot order
    terms: Vec<String>,

    #[serde(skip)]
    index: HashMap<String, usize>,

    dimension: usize,
}

impl Vocabulary {
    /// Build from one keyword set per document.
    ///
    /// Each set counts once per term, so the tally is a document frequency.
    /// Terms seen in fewer than `min_document_frequency` sets are discarded,
    /// the rest are ranked by frequency (ties alphabetical) and the top
    /// `dimension` are kept.
    pub fn build<S: AsRef<str>>(
        keyword_sets: &[Vec<S>],
        dimension: usize,
        min_document_frequency: usize,
    ) -> Self {
        let document_frequencies = document_frequencies(keyword_sets);

        let mut ranked: Vec<(&str, usize)> = document_frequencies
            .into_iter()
            .filter(|(_, df)| *df >= min_document_frequency.max(1))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(dimension);

        let terms = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
        Self::from_terms(terms, dimension)
    }

    /// Rebuild from terms already in slot order (used when loading a model).
    pub fn from_terms(terms: Vec<String>, dimension: usize) -> Self {
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self {
            terms,
            index,
            dimension,
        }
    }

    /// Slot for `term`, if it made the cut.
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.index.contains_key(term)
    }

    /// Terms in slot order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Number of terms actually retained (may be below `dimension`).
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Vector length every embedding produced with this vocabulary has.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub(crate) fn restore_index(&mut self) {
        if self.index.len() != self.terms.len() {
            *self = Self::from_terms(std::mem::take(&mut self.terms), self.dimension);
        }
    }
}

/// Number of keyword sets containing each term.
pub(crate) fn document_frequencies<S: AsRef<str>>(keyword_sets: &[Vec<S>]) -> HashMap<&str, usize> {
    let mut frequencies: HashMap<&str, usize> = HashMap::new();
    for set in keyword_sets {
        let unique: HashSet<&str> = set.iter().map(AsRef::as_ref).collect();
        for term in unique {
            *frequencies.entry(term).or_insert(0) += 1;
        }
    }
    frequencies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|s| s.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_min_document_frequency_cutoff() {
        let keyword_sets = sets(&[
            &["billing", "invoice", "refund"],
            &["billing", "invoice"],
            &["billing", "password"],
        ]);
        let vocab = Vocabulary::build(&keyword_sets, 10, 2);

        assert_eq!(vocab.terms(), &["billing", "invoice"]);
        assert_eq!(vocab.index_of("billing"), Some(0));
        assert_eq!(vocab.index_of("invoice"), Some(1));
        assert!(!vocab.contains("refund"));
        assert_eq!(vocab.dimension(), 10);
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn test_truncates_to_dimension() {
        let keyword_sets = sets(&[
            &["alpha", "beta", "gamma", "delta"],
            &["alpha", "beta", "gamma"],
            &["alpha", "beta"],
            &["alpha"],
        ]);
        let vocab = Vocabulary::build(&keyword_sets, 2, 1);
        assert_eq!(vocab.terms(), &["alpha", "beta"]);
    }

    #[test]
    fn test_duplicate_terms_count_once_per_document() {
        let keyword_sets = sets(&[&["login", "login", "login"], &["account"]]);
        let vocab = Vocabulary::build(&keyword_sets, 10, 2);
        assert!(vocab.is_empty());
    }

    #[test]
    fn test_serde_restores_lookup() {
        let vocab = Vocabulary::from_terms(vec!["one".into(), "two".into()], 4);
        let json = serde_json::to_string(&vocab).unwrap();
        let mut back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.index_of("two"), None);
        back.restore_index();
        assert_eq!(back.index_of("two"), Some(1));
        assert_eq!(back, vocab);
    }
}
