//! K-means clustering over stored vectors.
//!
//! # Algorithm Details
//! - Initialization: `k` distinct vectors sampled from a shuffled copy (unseeded)
//! - Assignment: nearest centroid under the chosen [`DistanceMetric`]
//! - Update: component-wise mean; an empty cluster collapses to the zero vector
//! - Stop: average centroid displacement below `tolerance`, or `max_iterations`
//!
//! Results depend on the random initialization and are a local optimum.
//!
//! # Performance Characteristics
//! - O(n * k * d * iterations) time complexity
//! - O(k * d) space for centroids
//! - Assignment step runs in parallel with rayon

use crate::vector::metric::{DistanceMetric, euclidean_distance};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use thiserror::Error;

/// Default maximum number of iterations for K-means clustering.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default convergence tolerance on average centroid movement.
pub const DEFAULT_TOLERANCE: f32 = 1e-4;

/// Parameters for a clustering run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions {
    pub num_clusters: usize,
    pub max_iterations: usize,
    pub tolerance: f32,
    pub metric: DistanceMetric,
}

impl ClusterOptions {
    pub fn new(num_clusters: usize) -> Self {
        Self {
            num_clusters,
            ..Self::default()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            num_clusters: 5,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Result of K-means clustering operation.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster centroids, each a vector of the same dimension as input vectors.
    pub centroids: Vec<Vec<f32>>,

    /// Cluster index (into `centroids`) for each input vector.
    pub assignments: Vec<usize>,

    /// Number of iterations run.
    pub iterations: usize,

    /// Whether displacement fell below tolerance before the iteration cap.
    pub converged: bool,
}

/// Errors that can occur during clustering operations.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error(
        "Empty vector set provided for clustering\nSuggestion: Add vectors to the store before clustering"
    )]
    EmptyVectorSet,

    #[error("Invalid cluster count: {0}\nSuggestion: Use k between 1 and the number of vectors")]
    InvalidClusterCount(usize),

    #[error(
        "Dimension mismatch in vectors\nSuggestion: Ensure all vectors come from the same encoder"
    )]
    DimensionMismatch,

    #[error("Invalid iteration limit: max_iterations must be at least 1")]
    InvalidIterationLimit,
}

/// Performs K-means clustering on a set of vectors.
///
/// # Arguments
/// * `vectors` - Input vectors to cluster (must be non-empty and same dimension)
/// * `options` - Cluster count (1..=vectors.len()), iteration cap, tolerance, metric
#[must_use = "clustering results should be used or the computation is wasted"]
pub fn kmeans_clustering(
    vectors: &[Vec<f32>],
    options: &ClusterOptions,
) -> Result<KMeansResult, ClusteringError> {
    let k = options.num_clusters;

    if vectors.is_empty() {
        return Err(ClusteringError::EmptyVectorSet);
    }
    if k == 0 || k > vectors.len() {
        return Err(ClusteringError::InvalidClusterCount(k));
    }
    if options.max_iterations == 0 {
        return Err(ClusteringError::InvalidIterationLimit);
    }

    let dimension = vectors[0].len();
    if vectors.iter().any(|v| v.len() != dimension) {
        return Err(ClusteringError::DimensionMismatch);
    }

    let mut centroids = initialize_centroids(vectors, k);
    let mut assignments = vec![0usize; vectors.len()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        iterations += 1;

        // Assignment step
        assignments = vectors
            .par_iter()
            .map(|vector| assign_to_nearest_centroid(vector, &centroids, options.metric))
            .collect();

        // Update step
        let new_centroids = update_centroids(vectors, &assignments, k, dimension);
        let movement = calculate_centroid_movement(&centroids, &new_centroids);
        centroids = new_centroids;

        if movement < options.tolerance {
            converged = true;
            break;
        }
    }

    if !converged {
        tracing::debug!(
            "K-means stopped at the iteration cap ({}) before converging",
            options.max_iterations
        );
    }

    Ok(KMeansResult {
        centroids,
        assignments,
        iterations,
        converged,
    })
}

/// Index of the nearest centroid; ties go to the lowest index.
pub fn assign_to_nearest_centroid(
    vector: &[f32],
    centroids: &[Vec<f32>],
    metric: DistanceMetric,
) -> usize {
    let mut best_distance = f32::INFINITY;
    let mut best_cluster = 0;

    for (i, centroid) in centroids.iter().enumerate() {
        let distance = metric.distance(vector, centroid);
        if distance < best_distance {
            best_distance = distance;
            best_cluster = i;
        }
    }

    best_cluster
}

/// Picks `k` distinct input positions from a shuffled index list.
fn initialize_centroids(vectors: &[Vec<f32>], k: usize) -> Vec<Vec<f32>> {
    let mut positions: Vec<usize> = (0..vectors.len()).collect();
    positions.shuffle(&mut rand::rng());
    positions
        .into_iter()
        .take(k)
        .map(|i| vectors[i].clone())
        .collect()
}

/// Recomputes each centroid as the mean of its members.
fn update_centroids(
    vectors: &[Vec<f32>],
    assignments: &[usize],
    k: usize,
    dimension: usize,
) -> Vec<Vec<f32>> {
    let mut sums = vec![vec![0.0f32; dimension]; k];
    let mut sizes = vec![0usize; k];

    for (vector, &cluster) in vectors.iter().zip(assignments) {
        for (sum, value) in sums[cluster].iter_mut().zip(vector) {
            *sum += value;
        }
        sizes[cluster] += 1;
    }

    for (centroid, &size) in sums.iter_mut().zip(&sizes) {
        // Empty cluster keeps the zero vector
        if size > 0 {
            for value in centroid.iter_mut() {
                *value /= size as f32;
            }
        }
    }

    sums
}

/// Average Euclidean displacement of centroids between iterations.
fn calculate_centroid_movement(old: &[Vec<f32>], new: &[Vec<f32>]) -> f32 {
    old.iter()
        .zip(new)
        .map(|(old_c, new_c)| euclidean_distance(old_c, new_c))
        .sum::<f32>()
        / old.len() as f32
}
