//! Embedding generation for semantic search
//!
//! The provider is an external collaborator behind an async trait; the
//! [`EmbeddingEngine`] wraps it with a bounded timeout, an LRU cache, and a
//! deterministic fallback so store operations never block on it.

mod engine;
mod fallback;

pub use engine::{EmbeddingEngine, EngineStats};
pub use fallback::{fallback_vector, DeterministicEmbedder};

use async_trait::async_trait;
use thiserror::Error;

/// Errors a provider may return. These never escape the engine; every failure
/// degrades to the deterministic fallback vector.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider is unreachable or rejected the request
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    /// Provider returned a vector of the wrong dimension
    #[error("provider returned {actual}-d vector, expected {expected}")]
    WrongDimension { expected: usize, actual: usize },
}

/// A remote (or local) vector-embedding provider
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text into a `dimension()`-length vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Fixed output dimension of this provider
    fn dimension(&self) -> usize;

    /// Short provider name for logs
    fn name(&self) -> &str {
        "provider"
    }
}
