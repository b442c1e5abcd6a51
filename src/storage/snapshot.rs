//! Serialized form of a store.

use crate::types::RecordMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Point-in-time copy of a store.
///
/// Maps are ordered so the same state always serializes to the same bytes.
/// `vectors` is absent for metadata-only exports, which cannot be imported
/// back into a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: String,
    /// Milliseconds since epoch at export time
    pub timestamp: u64,
    pub dimension: usize,
    pub count: usize,
    pub metadata: BTreeMap<String, RecordMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<BTreeMap<String, Vec<f32>>>,
    #[serde(default)]
    pub category_index: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub keyword_index: BTreeMap<String, Vec<String>>,
}

impl Snapshot {
    /// Whether this build can read a snapshot of this version.
    pub fn is_supported(&self) -> bool {
        self.version.split('.').next() == SNAPSHOT_VERSION.split('.').next()
    }
}
