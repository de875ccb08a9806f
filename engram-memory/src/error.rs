//! Error types for engram-memory

use thiserror::Error;

/// Errors that can occur in the memory store
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Entry cannot fit even after maximal eviction
    #[error("capacity exceeded: {needed} bytes cannot fit in a {max} byte store")]
    CapacityExceeded { needed: u64, max: u64 },

    /// Query vector length does not match the store dimension
    #[error("dimension mismatch: store holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Entry not found
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Snapshot encode/decode error
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Serialization error (bincode)
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl MemoryError {
    /// Create a capacity exceeded error
    pub fn capacity_exceeded(needed: u64, max: u64) -> Self {
        Self::CapacityExceeded { needed, max }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;
