//! Text encoding for knowledge-base retrieval
//!
//! This module turns free text into fixed-dimension vectors: keyword
//! extraction, a bounded vocabulary, and a TF-IDF weighting model.

mod tfidf;
pub mod tokenizer;
mod vocabulary;

pub use tfidf::{Encoder, IdfTable, ModelError, TfIdfVectorizer, idf};
pub use tokenizer::{DEFAULT_MAX_KEYWORDS, extract_keywords, keyword_counts, tokenize};
pub use vocabulary::{DEFAULT_MIN_DOCUMENT_FREQUENCY, Vocabulary};

/// Similarity threshold recommendations for TF-IDF cosine scores
pub mod thresholds {
    /// Threshold for passages sharing most of the query's weighted terms
    pub const VERY_SIMILAR: f32 = 0.60;

    /// Threshold for passages on the same topic
    pub const SIMILAR: f32 = 0.35;

    /// Threshold for loosely related passages
    pub const RELATED: f32 = 0.10;

    /// Default threshold for knowledge-base search
    pub const DEFAULT: f32 = RELATED;
}
