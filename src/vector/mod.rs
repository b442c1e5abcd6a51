//! Vector storage and search for knowledge-base passages.
//!
//! This module provides an in-memory store of fixed-dimension vectors with
//! attached metadata, brute-force similarity search, category and keyword
//! indexes, and k-means clustering over the stored vectors.
//!
//! # Performance Characteristics
//! - Search: O(n * d) per query, scored in parallel with rayon
//! - Category filter: candidates narrowed through the category index first
//! - Memory: ~4 bytes per dimension per vector plus metadata
//!
//! # Architecture
//! Vectors are unit-normalized on insert so cosine similarity reduces to a dot
//! product. Snapshots of the store are written and restored by
//! [`crate::storage`].

pub(crate) mod clustering;
pub(crate) mod index;
mod metric;
pub(crate) mod store;
mod types;

// Re-export core types for public API
pub use clustering::{
    ClusterOptions, ClusteringError, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE, KMeansResult,
    assign_to_nearest_centroid, kmeans_clustering,
};
pub use index::SecondaryIndex;
pub use metric::{
    DistanceMetric, cosine_similarity, dot, euclidean_distance, magnitude, manhattan_distance,
    normalize_in_place,
};
pub use store::{
    BatchResult, Cluster, MetadataFilter, OptimizeReport, SearchHit, SearchOptions, StoreStats,
    VectorStore,
};
pub use types::{DEFAULT_DIMENSION, VectorDimension};
