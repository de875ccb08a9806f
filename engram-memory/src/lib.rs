//! Engram Memory Layer
//!
//! Bounded-capacity embedding store for autonomous agents with semantic
//! search, pluggable eviction, and snapshot persistence.
//!
//! ## Features
//!
//! - **Hard byte-size ceiling** - Every store enforces `max_size_bytes`; a put
//!   that cannot fit even after maximal eviction fails, never over-commits
//! - **Pluggable eviction** - Classic LRU or a weighted quality score with
//!   30-day half-life age decay
//! - **Cosine similarity search** - Category-narrowed candidate sets, priority
//!   and threshold filters, per-category boosts
//! - **Degradable embeddings** - A slow or unavailable provider falls back to
//!   deterministic hash-seeded vectors; store operations never block on it
//! - **Snapshot persistence** - Versioned bincode blobs, fire-and-forget
//!   writes, corrupt snapshots load as an empty store
//!
//! ## Example
//!
//! ```ignore
//! use engram_memory::{
//!     DeterministicEmbedder, EmbeddingEngine, MemoryStore, PutRequest,
//!     RecencyPolicy, SearchOptions, StoreConfig,
//! };
//!
//! let engine = EmbeddingEngine::new(Arc::new(DeterministicEmbedder::new(256)));
//! let store = MemoryStore::new(
//!     StoreConfig::new(1_000_000, 256),
//!     engine,
//!     Arc::new(RecencyPolicy),
//! );
//!
//! let id = store
//!     .put(PutRequest::new("retry with exponential backoff on 429").category("task_patterns"))
//!     .await?;
//! let hits = store.search("rate limit handling", &SearchOptions::default()).await?;
//! ```

pub mod clock;
pub mod embedding;
pub mod entry;
pub mod error;
pub mod events;
pub mod eviction;
pub mod index;
pub mod persist;
pub mod search;
pub mod store;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use embedding::{
    DeterministicEmbedder, EmbeddingEngine, EmbeddingError, EmbeddingProvider, EngineStats,
};
pub use entry::{MemoryEntry, PutRequest, DEFAULT_CATEGORY};
pub use error::MemoryError;
pub use events::{MemoryEvent, Observer, ObserverSet};
pub use eviction::{EvictionPolicy, RecencyPolicy, ScorePolicy, ScoreWeights};
pub use persist::{BlobSink, FileSink, MemorySink, Snapshot};
pub use search::{SearchOptions, SearchResult};
pub use store::{MemoryStore, StoreConfig, StoreStats};
