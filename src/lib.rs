/// The main library module for kbsearch
pub mod config;
pub mod error;
pub mod retrieve;
pub mod semantic;
pub mod storage;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::{Settings, StoreConfig};
pub use error::{KnowledgeBaseError, KnowledgeBaseResult, StoreError, StoreResult};
pub use retrieve::{KnowledgeBase, QueryOptions, RetrievedPassage};
pub use semantic::{Encoder, TfIdfVectorizer};
pub use storage::{ImportReport, LoadOutcome, SaveOutcome, Snapshot};
pub use types::{Document, RecordMetadata, VectorRecord};
pub use vector::{DistanceMetric, SearchHit, SearchOptions, VectorStore};
