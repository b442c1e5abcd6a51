//! Distance metrics and the similarity scores derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Norms below this are treated as zero.
const EPSILON: f32 = 1e-10;

/// Unit vectors within this distance of length 1 are left untouched, so
/// re-normalizing an already normalized vector is exact.
const UNIT_TOLERANCE: f32 = 4.0 * f32::EPSILON;

/// Metric used to compare a query against stored vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Dot product of unit vectors, clamped to `[0, 1]`
    #[default]
    Cosine,
    /// `1 / (1 + L2 distance)`
    Euclidean,
    /// `1 / (1 + L1 distance)`
    Manhattan,
}

impl DistanceMetric {
    /// Similarity score in `[0, 1]`, higher is closer.
    ///
    /// Cosine assumes both inputs are unit-normalized (or zero) and clamps
    /// negative similarity to 0, so opposite directions look unrelated
    /// rather than anti-related. The distance-based scores are monotonic
    /// but not comparable across metrics.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => dot(a, b).clamp(0.0, 1.0),
            Self::Euclidean => 1.0 / (1.0 + euclidean_distance(a, b)),
            Self::Manhattan => 1.0 / (1.0 + manhattan_distance(a, b)),
        }
    }

    /// Distance used for clustering, lower is closer.
    ///
    /// Cosine distance does not assume unit inputs since centroids are means.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::Euclidean => euclidean_distance(a, b),
            Self::Manhattan => manhattan_distance(a, b),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "manhattan" | "l1" => Ok(Self::Manhattan),
            other => Err(format!(
                "unknown metric '{other}' (expected cosine, euclidean or manhattan)"
            )),
        }
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity in `[-1, 1]`; zero if either vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = magnitude(a);
    let norm_b = magnitude(b);
    if norm_a < EPSILON || norm_b < EPSILON {
        0.0
    } else {
        dot(a, b) / (norm_a * norm_b)
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Scales `v` to unit length in place. Only an all-zero vector is left
/// unchanged.
///
/// The norm is accumulated in f64 so that finite components far from 1.0
/// neither overflow nor vanish when squared.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = v
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || (norm - 1.0).abs() <= f64::from(UNIT_TOLERANCE) {
        return;
    }
    for value in v.iter_mut() {
        *value = (f64::from(*value) / norm) as f32;
    }
}
