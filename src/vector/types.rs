//! Type-safe wrappers for vector search.
//!
//! Dimension checks live here so every entry point (add, update, search,
//! import) rejects malformed vectors the same way.

use crate::error::StoreError;

/// Default vector dimension (vocabulary size) for knowledge-base embeddings.
pub const DEFAULT_DIMENSION: usize = 200;

/// Type-safe wrapper for vector dimensions.
///
/// Fixed for a store's lifetime; every stored vector has exactly this length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, StoreError> {
        if dim == 0 {
            return Err(StoreError::InvalidConfig {
                reason: "vector dimension cannot be zero".to_string(),
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates length and finiteness. Malformed vectors are rejected,
    /// never padded, truncated or sanitized.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.0 {
            return Err(StoreError::invalid_vector(format!(
                "expected {} dimensions, got {}",
                self.0,
                vector.len()
            )));
        }
        if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
            return Err(StoreError::invalid_vector(format!(
                "component {pos} is not finite ({})",
                vector[pos]
            )));
        }
        Ok(())
    }
}

impl Default for VectorDimension {
    fn default() -> Self {
        Self(DEFAULT_DIMENSION)
    }
}

impl std::fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
