//! TF-IDF encoder turning free text into fixed-dimension unit vectors.
//!
//! # Document frequency
//!
//! Document frequency is counted over each document's *truncated* keyword
//! set (its top-`max_keywords` terms), not over the full token stream. A term
//! that is rare inside a long, diverse document may fall out of that
//! document's keyword set and go uncounted, so its IDF is overestimated. This
//! trades some precision for a much smaller per-document term set and is
//! kept as-is: changing it changes every ranking.

use crate::semantic::tokenizer::{self, DEFAULT_MAX_KEYWORDS};
use crate::semantic::vocabulary::{DEFAULT_MIN_DOCUMENT_FREQUENCY, Vocabulary, document_frequencies};
use crate::storage::write_json_atomic;
use crate::vector::normalize_in_place;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Turns text into vectors of a fixed dimension.
///
/// Implementations must be deterministic: the same text always yields the
/// same vector for the lifetime of the encoder.
pub trait Encoder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;

    fn dimension(&self) -> usize;

    fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Errors raised while persisting or restoring a fitted model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("No fitted model at '{path}'\nSuggestion: Run 'kbsearch index <corpus>' first")]
    Missing { path: PathBuf },

    #[error("Failed to access model file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Model file '{path}' is corrupted: {reason}\nSuggestion: Re-run indexing")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Model format version {actual} is newer than supported version {expected}")]
    VersionMismatch { expected: u32, actual: u32 },
}

/// Smoothed inverse document frequency.
///
/// `ln((N + 1) / (df + 1)) + 1`, which is exactly 1 for a term present in
/// every document and grows as the term gets rarer.
pub fn idf(document_count: usize, document_frequency: usize) -> f32 {
    let n = document_count as f64;
    let df = document_frequency as f64;
    (((n + 1.0) / (df + 1.0)).ln() + 1.0) as f32
}

/// IDF weight per vocabulary slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdfTable {
    weights: Vec<f32>,
    document_count: usize,
}

impl IdfTable {
    /// Compute weights for every vocabulary term from the same keyword sets
    /// the vocabulary was built from.
    pub fn compute<S: AsRef<str>>(keyword_sets: &[Vec<S>], vocabulary: &Vocabulary) -> Self {
        let frequencies = document_frequencies(keyword_sets);
        let document_count = keyword_sets.len();

        let weights = vocabulary
            .terms()
            .iter()
            .map(|term| {
                let df = frequencies.get(term.as_str()).copied().unwrap_or(0);
                idf(document_count, df)
            })
            .collect();

        Self {
            weights,
            document_count,
        }
    }

    /// Weight for a vocabulary slot.
    pub fn weight(&self, slot: usize) -> Option<f32> {
        self.weights.get(slot).copied()
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Serialized form of a fitted vectorizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TfIdfModel {
    version: u32,
    max_keywords: usize,
    vocabulary: Vocabulary,
    idf: IdfTable,
    fitted_at: u64,
}

impl TfIdfModel {
    const CURRENT_VERSION: u32 = 1;
}

/// TF-IDF encoder fitted once on a corpus and immutable afterwards.
///
/// Refitting means building a new vectorizer and re-embedding every document;
/// vectors from different fits are not comparable.
#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    vocabulary: Vocabulary,
    idf: IdfTable,
    max_keywords: usize,
}

impl TfIdfVectorizer {
    /// Fit on raw corpus texts with default keyword and frequency limits.
    pub fn fit<S: AsRef<str> + Sync>(texts: &[S], dimension: usize) -> Self {
        let keyword_sets: Vec<Vec<String>> = texts
            .par_iter()
            .map(|t| tokenizer::extract_keywords(t.as_ref(), DEFAULT_MAX_KEYWORDS))
            .collect();
        Self::fit_keywords(
            &keyword_sets,
            dimension,
            DEFAULT_MIN_DOCUMENT_FREQUENCY,
            DEFAULT_MAX_KEYWORDS,
        )
    }

    /// Fit on precomputed keyword sets, one per document.
    pub fn fit_keywords<S: AsRef<str>>(
        keyword_sets: &[Vec<S>],
        dimension: usize,
        min_document_frequency: usize,
        max_keywords: usize,
    ) -> Self {
        let vocabulary = Vocabulary::build(keyword_sets, dimension, min_document_frequency);
        let idf = IdfTable::compute(keyword_sets, &vocabulary);

        debug!(
            "Fitted TF-IDF on {} documents: {} of {dimension} slots used",
            keyword_sets.len(),
            vocabulary.len()
        );

        Self {
            vocabulary,
            idf,
            max_keywords,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn idf(&self) -> &IdfTable {
        &self.idf
    }

    pub fn max_keywords(&self) -> usize {
        self.max_keywords
    }

    /// Keywords of `text` under this vectorizer's keyword limit.
    pub fn keywords(&self, text: &str) -> Vec<String> {
        tokenizer::extract_keywords(text, self.max_keywords)
    }

    /// IDF weight of `term`, if it is in the vocabulary.
    pub fn idf_of(&self, term: &str) -> Option<f32> {
        self.vocabulary
            .index_of(term)
            .and_then(|slot| self.idf.weight(slot))
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.vocabulary.dimension()];
        let counts = tokenizer::keyword_counts(text, self.max_keywords);
        let total: usize = counts.iter().map(|(_, c)| c).sum();
        if total == 0 {
            return vector;
        }

        for (term, count) in &counts {
            let Some(slot) = self.vocabulary.index_of(term) else {
                continue;
            };
            if let Some(value) = vector.get_mut(slot) {
                let tf = *count as f32 / total as f32;
                *value = tf * self.idf.weight(slot).unwrap_or(0.0);
            }
        }

        normalize_in_place(&mut vector);
        vector
    }

    /// Save the fitted model as JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let model = TfIdfModel {
            version: TfIdfModel::CURRENT_VERSION,
            max_keywords: self.max_keywords,
            vocabulary: self.vocabulary.clone(),
            idf: self.idf.clone(),
            fitted_at: crate::types::get_utc_timestamp(),
        };

        write_json_atomic(path, &model).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            "Saved TF-IDF model ({} terms) to {}",
            self.vocabulary.len(),
            path.display()
        );
        Ok(())
    }

    /// Load a model written by [`TfIdfVectorizer::save`].
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::Missing {
                path: path.to_path_buf(),
            });
        }

        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut model: TfIdfModel =
            serde_json::from_str(&json).map_err(|e| ModelError::Corrupted {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if model.version > TfIdfModel::CURRENT_VERSION {
            return Err(ModelError::VersionMismatch {
                expected: TfIdfModel::CURRENT_VERSION,
                actual: model.version,
            });
        }
        let vocabulary = &model.vocabulary;
        if vocabulary.dimension() == 0 || vocabulary.len() > vocabulary.dimension() {
            return Err(ModelError::Corrupted {
                path: path.to_path_buf(),
                reason: format!(
                    "{} vocabulary terms do not fit dimension {}",
                    vocabulary.len(),
                    vocabulary.dimension()
                ),
            });
        }
        if model.idf.len() != model.vocabulary.len() {
            return Err(ModelError::Corrupted {
                path: path.to_path_buf(),
                reason: format!(
                    "{} IDF weights for {} vocabulary terms",
                    model.idf.len(),
                    model.vocabulary.len()
                ),
            });
        }

        model.vocabulary.restore_index();
        Ok(Self {
            vocabulary: model.vocabulary,
            idf: model.idf,
            max_keywords: model.max_keywords,
        })
    }
}

impl Encoder for TfIdfVectorizer {
    /// Never fails. Text without in-vocabulary terms maps to the zero vector,
    /// which scores ~0 against everything.
    fn embed(&self, text: &str) -> Vec<f32> {
        self.encode(text)
    }

    fn dimension(&self) -> usize {
        self.vocabulary.dimension()
    }
}
