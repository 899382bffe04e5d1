//! Newtypes and the error type shared by the vector modules.

use std::num::NonZeroU32;
use thiserror::Error;

/// One IVF partition. Stored one-based so a zeroed layout never aliases a
/// real cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId(NonZeroU32);

impl ClusterId {
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Cluster for the centroid at `index` in the centroid list.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index as u32))
    }

    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    #[must_use]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Embedding width fixed by the first vector an index sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "an embedding must have at least one component",
            });
        }
        Ok(Self(dim))
    }

    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Every commit in one index shares the width of the first.
    pub fn check(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure the query and the index use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("I/O error: {0}\nSuggestion: Check that the index directory exists and is readable")]
    Io(#[from] std::io::Error),

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Check the model name and that the model cache directory is writable"
    )]
    EmbeddingFailed(String),

    #[error(
        "Clustering failed: {0}\nSuggestion: Ensure enough commits are indexed to build the ANN index"
    )]
    ClusteringFailed(String),

    #[error(
        "ANN sidecar unreadable: {0}\nSuggestion: Rebuild it with 'gitsem index --ann always'"
    )]
    Serialization(String),

    #[error(
        "ANN sidecar version {actual} is not supported (expected {expected})\nSuggestion: Rebuild it with 'gitsem index --ann always'"
    )]
    VersionMismatch { expected: u32, actual: u32 },
}
