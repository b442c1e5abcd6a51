//! Error types for the retrieval engine
//!
//! This module provides structured error types using thiserror so callers can
//! react to each failure class (bad input, missing record, full store, disk
//! trouble) without string matching.

use crate::semantic::ModelError;
use crate::vector::ClusteringError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the vector store and its persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Wrong dimension or a non-finite component. Never coerced.
    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Invalid record id: ids must be non-empty")]
    InvalidId,

    #[error("Record '{id}' not found")]
    NotFound { id: String },

    #[error("Store is full: capacity of {max} vectors reached")]
    CapacityExceeded { max: usize },

    #[error("Failed to persist store at '{path}': {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Snapshot at '{path}' could not be decoded: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("No persistence path configured; set store.persistence_path to enable saving")]
    PersistenceDisabled,

    #[error("Snapshot carries no vectors; export with vectors to make it importable")]
    IncompleteSnapshot,

    /// Bad constructor configuration. Fatal by design of the caller.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Clustering failed: {0}")]
    Clustering(#[from] ClusteringError),
}

impl StoreError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::InvalidVector { .. } => "INVALID_VECTOR",
            Self::InvalidId => "INVALID_ID",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
            Self::CorruptSnapshot { .. } => "CORRUPT_SNAPSHOT",
            Self::PersistenceDisabled => "PERSISTENCE_DISABLED",
            Self::IncompleteSnapshot => "INCOMPLETE_SNAPSHOT",
            Self::InvalidConfig { .. } => "CONFIG_ERROR",
            Self::Clustering(_) => "CLUSTERING_ERROR",
        }
    }

    pub(crate) fn invalid_vector(reason: impl Into<String>) -> Self {
        Self::InvalidVector {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }
}

/// Errors raised while building or reopening a knowledge base
#[derive(Error, Debug)]
pub enum KnowledgeBaseError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Corpus is empty; at least one document is required to fit the vocabulary")]
    EmptyCorpus,

    #[error("Duplicate document id '{id}' in corpus")]
    DuplicateDocument { id: String },
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for knowledge base operations
pub type KnowledgeBaseResult<T> = Result<T, KnowledgeBaseError>;
