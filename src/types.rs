//! Core data types shared by the encoder, the vector store and persistence.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current UTC time in milliseconds since the Unix epoch.
pub fn get_utc_timestamp() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// A knowledge-base document as produced by the corpus loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,

    /// Path of headings leading to this passage (e.g. "Billing > Invoices")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Document {
    /// Text fed to the encoder for this document.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

/// Metadata attached to every stored vector.
///
/// The named fields cover what the retrieval layer needs. Anything else a
/// caller wants to keep travels in `extra`, which is flattened into the
/// serialized form so snapshots stay forward compatible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Frequency-ranked keywords, used for the keyword index and snippets
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Set by the store when the record is first added (ms since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,

    /// Set by the store on every add or update (ms since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RecordMetadata {
    /// Metadata for a corpus document with its extracted keywords.
    pub fn from_document(document: &Document, keywords: Vec<String>) -> Self {
        Self {
            title: document.title.clone(),
            content: document.content.clone(),
            category: Some(document.category.clone()).filter(|c| !c.is_empty()),
            keywords,
            section: document.section.clone(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Rough heap footprint, used by store statistics.
    pub(crate) fn estimated_bytes(&self) -> usize {
        self.title.len()
            + self.content.len()
            + self.category.as_ref().map_or(0, String::len)
            + self.section.as_ref().map_or(0, String::len)
            + self.keywords.iter().map(String::len).sum::<usize>()
            + self
                .extra
                .iter()
                .map(|(k, v)| k.len() + v.to_string().len())
                .sum::<usize>()
    }
}

/// A stored record as returned by lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}
