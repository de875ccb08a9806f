//! Eviction policies
//!
//! The capacity governor asks the active policy for one victim at a time and
//! removes it, repeating until the incoming entry fits or the target headroom
//! is reached. Policies only choose; they never remove anything themselves
//! and never fail. An empty store simply yields no victim.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::entry::MemoryEntry;

/// Chooses which entry to evict next
pub trait EvictionPolicy: Send + Sync {
    /// Policy name for logs
    fn name(&self) -> &'static str;

    /// Pick the next victim, or `None` when nothing is evictable
    fn select_victim(
        &self,
        entries: &HashMap<String, MemoryEntry>,
        now: DateTime<Utc>,
    ) -> Option<String>;
}

/// Classic LRU: evict the entry with the oldest `last_accessed_at` first
#[derive(Debug, Default, Clone, Copy)]
pub struct RecencyPolicy;

impl EvictionPolicy for RecencyPolicy {
    fn name(&self) -> &'static str {
        "recency"
    }

    fn select_victim(
        &self,
        entries: &HashMap<String, MemoryEntry>,
        _now: DateTime<Utc>,
    ) -> Option<String> {
        entries
            .values()
            .min_by(|a, b| {
                a.last_accessed_at
                    .cmp(&b.last_accessed_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|e| e.id.clone())
    }
}

/// Age at which the decay term has halved
const HALF_LIFE_DAYS: f64 = 30.0;

/// Usage term saturates at 100 accesses
const USAGE_SATURATION: f64 = 100.0;

/// Words that signal performative, low-information content
const FILLER_WORDS: &[&str] = &[
    "successfully",
    "comprehensive",
    "seamless",
    "leverage",
    "robust",
    "world-class",
    "cutting-edge",
    "synergy",
];

/// Weights for the quality score terms. Each term is in `[0, 1]`; with the
/// default weights the total is too.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    /// Substance heuristic over the content
    pub substance: f64,
    /// Recorded priority (the caller's success signal)
    pub priority: f64,
    /// Log-scaled access count
    pub usage: f64,
    /// Exponential age decay, 30-day half-life
    pub recency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            substance: 0.3,
            priority: 0.3,
            usage: 0.2,
            recency: 0.2,
        }
    }
}

/// Evict the lowest quality score first, ties broken by oldest `created_at`
#[derive(Debug, Default, Clone, Copy)]
pub struct ScorePolicy {
    pub weights: ScoreWeights,
}

impl ScorePolicy {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Concrete-content heuristic: numbers, paths, code and assignments push
    /// the signal up; filler vocabulary pushes it down.
    fn substance_signal(content: &str) -> f64 {
        let lower = content.to_lowercase();
        let mut signal: f64 = 0.5;

        if content.bytes().any(|b| b.is_ascii_digit()) {
            signal += 0.15;
        }
        if content.contains('/') || content.contains("::") {
            signal += 0.15;
        }
        if content.contains('`') {
            signal += 0.1;
        }
        if content.contains('=') || content.contains("->") {
            signal += 0.1;
        }
        for word in FILLER_WORDS {
            if lower.contains(word) {
                signal -= 0.1;
            }
        }

        signal.clamp(0.0, 1.0)
    }

    /// Weighted quality score in `[0, 1]`
    pub fn quality_score(&self, entry: &MemoryEntry, now: DateTime<Utc>) -> f64 {
        let substance = Self::substance_signal(&entry.content);
        let priority = f64::from(entry.priority.clamp(0, 10)) / 10.0;
        let usage =
            ((1.0 + entry.access_count as f64).ln() / (1.0 + USAGE_SATURATION).ln()).min(1.0);
        let recency = (-(entry.age_days(now) / HALF_LIFE_DAYS)).exp2();

        let w = &self.weights;
        (w.substance * substance + w.priority * priority + w.usage * usage + w.recency * recency)
            .clamp(0.0, 1.0)
    }
}

impl EvictionPolicy for ScorePolicy {
    fn name(&self) -> &'static str {
        "score"
    }

    fn select_victim(
        &self,
        entries: &HashMap<String, MemoryEntry>,
        now: DateTime<Utc>,
    ) -> Option<String> {
        entries
            .values()
            .min_by(|a, b| {
                let sa = self.quality_score(a, now);
                let sb = self.quality_score(b, now);
                sa.partial_cmp(&sb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.created_at.cmp(&b.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|e| e.id.clone())
    }
}
