//! Embedding engine
//!
//! Wraps a provider with an LRU cache, a bounded timeout, and the
//! deterministic fallback. `embed` is infallible by design: callers cannot
//! distinguish a real from a fallback vector, only the counters can.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::fallback::fallback_vector;
use super::EmbeddingProvider;

/// Default bound on one provider call
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of cached text -> vector pairs
const DEFAULT_CACHE_SIZE: usize = 2048;

/// Embedding engine with caching and degradation
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    timeout: Duration,
    cache: Mutex<LruCache<String, Vec<f32>>>,
    real_embeds: AtomicU64,
    fallback_embeds: AtomicU64,
}

impl EmbeddingEngine {
    /// Create an engine over the given provider with default timeout and cache
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Arc<Self> {
        Self::with_settings(provider, DEFAULT_TIMEOUT, DEFAULT_CACHE_SIZE)
    }

    /// Create an engine with an explicit timeout and cache capacity
    pub fn with_settings(
        provider: Arc<dyn EmbeddingProvider>,
        timeout: Duration,
        cache_size: usize,
    ) -> Arc<Self> {
        let capacity =
            NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap());
        let dimension = provider.dimension();

        Arc::new(Self {
            provider,
            dimension,
            timeout,
            cache: Mutex::new(LruCache::new(capacity)),
            real_embeds: AtomicU64::new(0),
            fallback_embeds: AtomicU64::new(0),
        })
    }

    /// Embed text, degrading to the deterministic fallback on provider
    /// failure, timeout, or a wrong-dimension response.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        if let Some(cached) = self.cache.lock().get(text) {
            return cached.clone();
        }

        match tokio::time::timeout(self.timeout, self.provider.embed(text)).await {
            Ok(Ok(vector)) if vector.len() == self.dimension => {
                self.real_embeds.fetch_add(1, Ordering::Relaxed);
                self.cache.lock().put(text.to_string(), vector.clone());
                vector
            }
            Ok(Ok(vector)) => {
                log::warn!(
                    "provider '{}' returned {}-d vector, expected {}; using fallback",
                    self.provider.name(),
                    vector.len(),
                    self.dimension
                );
                self.degrade(text)
            }
            Ok(Err(e)) => {
                log::warn!(
                    "provider '{}' failed: {}; using fallback",
                    self.provider.name(),
                    e
                );
                self.degrade(text)
            }
            Err(_) => {
                log::warn!(
                    "provider '{}' timed out after {:?}; using fallback",
                    self.provider.name(),
                    self.timeout
                );
                self.degrade(text)
            }
        }
    }

    // Fallback vectors are not cached, so a recovered provider supplies the
    // real vector on the next call for the same text.
    fn degrade(&self, text: &str) -> Vec<f32> {
        self.fallback_embeds.fetch_add(1, Ordering::Relaxed);
        fallback_vector(text, self.dimension)
    }

    /// Fixed output dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Counters for monitoring
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            real_embeds: self.real_embeds.load(Ordering::Relaxed),
            fallback_embeds: self.fallback_embeds.load(Ordering::Relaxed),
            cached_entries: self.cache.lock().len(),
        }
    }
}

/// Engine counters
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Vectors served by the provider
    pub real_embeds: u64,
    /// Vectors served by the deterministic fallback
    pub fallback_embeds: u64,
    /// Current cache population
    pub cached_entries: usize,
}
