//! Knowledge-base retrieval: fit, index, query.
//!
//! [`KnowledgeBase`] ties a fitted [`TfIdfVectorizer`] to a [`VectorStore`]
//! and turns store hits into passages with a short snippet.

use crate::config::{SearchConfig, Settings};
use crate::error::{KnowledgeBaseError, KnowledgeBaseResult, StoreError};
use crate::semantic::{Encoder, TfIdfVectorizer, tokenize};
use crate::storage::LoadOutcome;
use crate::types::{Document, RecordMetadata};
use crate::vector::{SearchHit, SearchOptions, StoreStats, VectorStore};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-query knobs for [`KnowledgeBase::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub max_results: usize,
    pub min_similarity: f32,
    pub category: Option<String>,
}

impl QueryOptions {
    pub fn from_settings(search: &SearchConfig) -> Self {
        Self {
            max_results: search.max_results,
            min_similarity: search.min_similarity,
            category: None,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from_settings(&SearchConfig::default())
    }
}

/// A ranked passage ready to show to a user or feed to a prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub similarity: f32,
    pub snippet: String,
}

/// A fitted encoder plus the store of encoded documents.
#[derive(Debug)]
pub struct KnowledgeBase {
    encoder: TfIdfVectorizer,
    store: Arc<VectorStore>,
    settings: Settings,
}

impl KnowledgeBase {
    /// Fit the vocabulary on `documents` and index all of them.
    ///
    /// Keyword extraction and embedding run in parallel; the store is filled
    /// with one batch insert. Nothing is written to disk until [`save`] or
    /// an autosave.
    ///
    /// [`save`]: KnowledgeBase::save
    pub fn build(documents: &[Document], settings: Settings) -> KnowledgeBaseResult<Self> {
        if documents.is_empty() {
            return Err(KnowledgeBaseError::EmptyCorpus);
        }
        let mut seen = HashSet::with_capacity(documents.len());
        for doc in documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(KnowledgeBaseError::DuplicateDocument { id: doc.id.clone() });
            }
        }

        let store_config = settings.store_config();
        let max_keywords = settings.vocabulary.max_keywords;

        let texts: Vec<String> = documents.par_iter().map(Document::embedding_text).collect();
        let keyword_sets: Vec<Vec<String>> = texts
            .par_iter()
            .map(|text| crate::semantic::extract_keywords(text, max_keywords))
            .collect();

        let encoder = TfIdfVectorizer::fit_keywords(
            &keyword_sets,
            store_config.dimension,
            settings.vocabulary.min_document_frequency,
            max_keywords,
        );
        if encoder.vocabulary().is_empty() {
            warn!(
                "No term reached the minimum document frequency of {}; every vector will be zero",
                settings.vocabulary.min_document_frequency
            );
        }

        let vectors: Vec<Vec<f32>> = texts.par_iter().map(|text| encoder.embed(text)).collect();

        let store = VectorStore::new(store_config)?;
        let items = documents
            .iter()
            .zip(vectors)
            .zip(keyword_sets)
            .map(|((doc, vector), keywords)| {
                (
                    doc.id.clone(),
                    vector,
                    RecordMetadata::from_document(doc, keywords),
                )
            });
        let batch = store.add_batch(items);
        if let Some((position, error)) = batch.errors.into_iter().next() {
            warn!("Document at position {position} was rejected: {error}");
            return Err(error.into());
        }

        info!(
            "Indexed {} documents ({} vocabulary terms, dimension {})",
            batch.successful,
            encoder.vocabulary().len(),
            encoder.dimension()
        );

        Ok(Self {
            encoder,
            store: Arc::new(store),
            settings,
        })
    }

    /// Reopen a knowledge base saved by [`KnowledgeBase::save`].
    pub fn open(settings: Settings) -> KnowledgeBaseResult<Self> {
        let encoder = TfIdfVectorizer::load(&settings.model_path())?;
        let store_config = settings.store_config();
        if encoder.dimension() != store_config.dimension {
            return Err(StoreError::InvalidConfig {
                reason: format!(
                    "model dimension {} does not match store dimension {}",
                    encoder.dimension(),
                    store_config.dimension
                ),
            }
            .into());
        }

        let store = VectorStore::new(store_config)?;
        match store.load()? {
            LoadOutcome::Loaded(report) => {
                if report.failed > 0 {
                    warn!("{} stored passages could not be restored", report.failed);
                }
            }
            LoadOutcome::NotLoaded { reason } => warn!("Opened an empty knowledge base: {reason}"),
        }

        Ok(Self {
            encoder,
            store: Arc::new(store),
            settings,
        })
    }

    /// Passages most similar to `query`, best first.
    ///
    /// A query with no vocabulary terms matches nothing.
    pub fn search(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> KnowledgeBaseResult<Vec<RetrievedPassage>> {
        let vector = self.encoder.embed(query);
        if vector.iter().all(|v| *v == 0.0) {
            debug!("Query '{query}' has no vocabulary terms");
            return Ok(Vec::new());
        }

        let mut search = SearchOptions::new(options.max_results)
            .with_threshold(options.min_similarity)
            .with_metric(self.settings.search.metric);
        if let Some(category) = &options.category {
            search = search.with_category(category.clone());
        }

        let hits = self.store.search(&vector, &search)?;
        let keywords = self.encoder.keywords(query);
        Ok(hits
            .into_iter()
            .map(|hit| self.passage(hit, &keywords))
            .collect())
    }

    /// Passages most similar to the stored passage `id`.
    pub fn similar(&self, id: &str, limit: usize) -> KnowledgeBaseResult<Vec<RetrievedPassage>> {
        let options = SearchOptions::new(limit)
            .with_threshold(self.settings.search.min_similarity)
            .with_metric(self.settings.search.metric);
        let hits = self.store.find_similar(id, &options)?;
        Ok(hits.into_iter().map(|hit| self.passage(hit, &[])).collect())
    }

    fn passage(&self, hit: SearchHit, keywords: &[String]) -> RetrievedPassage {
        let SearchHit {
            id,
            score,
            metadata,
        } = hit;
        let snippet = snippet(&metadata.content, keywords, self.settings.search.snippet_chars);
        RetrievedPassage {
            id,
            title: metadata.title,
            content: metadata.content,
            category: metadata.category,
            similarity: score,
            snippet,
        }
    }

    /// Persist the model and the store.
    pub fn save(&self) -> KnowledgeBaseResult<()> {
        self.encoder.save(&self.settings.model_path())?;
        self.store.save()?;
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn encoder(&self) -> &TfIdfVectorizer {
        &self.encoder
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// The sentence of `content` sharing the most terms with `keywords`,
/// truncated to `max_chars` characters.
///
/// Falls back to the first sentence when nothing overlaps. Earlier sentences
/// win ties.
pub fn snippet(content: &str, keywords: &[String], max_chars: usize) -> String {
    let sentences: Vec<&str> = content
        .split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut best: Option<(usize, &str)> = None;
    for &sentence in &sentences {
        let terms: HashSet<String> = tokenize(sentence).into_iter().collect();
        let overlap = keywords.iter().filter(|k| terms.contains(*k)).count();
        if overlap > 0 && best.is_none_or(|(score, _)| overlap > score) {
            best = Some((overlap, sentence));
        }
    }

    let chosen = best
        .map(|(_, sentence)| sentence)
        .or_else(|| sentences.first().copied())
        .unwrap_or("");
    truncate_chars(chosen, max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", text[..end].trim_end()),
        None => text.to_string(),
    }
}
