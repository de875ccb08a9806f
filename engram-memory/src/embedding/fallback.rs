//! Deterministic fallback vectors
//!
//! When the real provider is slow or down, the engine substitutes a vector
//! seeded by a stable hash of the text. The same text always maps to the same
//! vector, so size accounting and snapshot round-trips stay exact.

use async_trait::async_trait;

use super::{EmbeddingError, EmbeddingProvider};

/// FNV-1a over the text bytes; stable across runs and platforms
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in bytes {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// xorshift64* step
fn next_state(state: u64) -> u64 {
    let mut x = state;
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    x.wrapping_mul(0x2545F4914F6CDD1D)
}

/// Generate the deterministic fallback vector for `text`.
///
/// Components are drawn in `[-1, 1]` from an xorshift stream seeded with the
/// FNV-1a hash of the text, then L2-normalized.
pub fn fallback_vector(text: &str, dimension: usize) -> Vec<f32> {
    // `| 1` keeps the xorshift state non-zero
    let mut state = fnv1a(text.as_bytes()) | 1;

    let mut vec: Vec<f32> = (0..dimension)
        .map(|_| {
            state = next_state(state);
            // Top 24 bits -> [0, 1) -> [-1, 1)
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            unit * 2.0 - 1.0
        })
        .collect();

    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut vec {
            *v /= norm;
        }
    }

    vec
}

/// Provider that only ever produces fallback vectors.
///
/// Useful on its own for air-gapped runs and as the engine's degradation
/// target when a real provider misbehaves.
#[derive(Debug, Clone)]
pub struct DeterministicEmbedder {
    dimension: usize,
}

impl DeterministicEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(fallback_vector(text, self.dimension))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "deterministic-fallback"
    }
}
