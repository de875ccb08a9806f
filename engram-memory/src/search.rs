//! Similarity ranking
//!
//! Cosine similarity over the candidate set with priority and threshold
//! filters and optional per-category boosts. Ordering is fixed as
//! filter -> boost -> sort: a boost can reorder results that already cleared
//! the threshold, never rescue one that did not.

use serde::Serialize;
use std::collections::HashMap;

use crate::entry::MemoryEntry;

/// Search parameters with documented defaults
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Restrict candidates to one category (index lookup instead of full scan)
    pub category: Option<String>,
    /// Exclude entries below this priority before scoring
    pub min_priority: Option<i32>,
    /// Maximum results returned (default 10)
    pub max_results: usize,
    /// Exclude results scoring below this similarity (default 0.0)
    pub threshold: f32,
    /// Per-category similarity multipliers applied after the threshold filter
    pub boost: Option<HashMap<String, f32>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            category: None,
            min_priority: None,
            max_results: 10,
            threshold: 0.0,
            boost: None,
        }
    }
}

/// One ranked hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    /// Possibly boosted cosine similarity used for ranking
    pub similarity: f32,
    pub category: String,
    pub priority: i32,
}

/// Calculate cosine similarity between two vectors.
///
/// A zero-norm vector compares as 0.0 against anything, never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Rank candidates against the query vector.
///
/// Results are descending by (boosted) similarity with a stable ascending-id
/// tie-break, truncated to `max_results`.
pub(crate) fn rank<'a>(
    candidates: impl Iterator<Item = &'a MemoryEntry>,
    query: &[f32],
    opts: &SearchOptions,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = candidates
        .filter(|e| opts.min_priority.is_none_or(|min| e.priority >= min))
        .filter_map(|e| {
            let similarity = cosine_similarity(query, &e.embedding);
            if similarity < opts.threshold {
                return None;
            }
            let boosted = match &opts.boost {
                Some(boost) => similarity * boost.get(&e.category).copied().unwrap_or(1.0),
                None => similarity,
            };
            Some(SearchResult {
                id: e.id.clone(),
                similarity: boosted,
                category: e.category.clone(),
                priority: e.priority,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(opts.max_results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::entry_size_bytes;
    use chrono::Utc;

    fn make_entry(id: &str, category: &str, priority: i32, embedding: Vec<f32>) -> MemoryEntry {
        let now = Utc::now();
        MemoryEntry {
            id: id.into(),
            content: "x".into(),
            embedding,
            size_bytes: entry_size_bytes("x", 3),
            category: category.into(),
            priority,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity_zero_vector_is_exactly_zero() {
        let zero = vec![0.0, 0.0, 0.0];
        let any = vec![0.3, -0.7, 0.2];
        let sim = cosine_similarity(&zero, &any);
        assert_eq!(sim, 0.0);
        assert!(!sim.is_nan());
    }

    #[test]
    fn test_rank_orders_descending() {
        let entries = vec![
            make_entry("far", "general", 0, vec![0.0, 1.0, 0.0]),
            make_entry("near", "general", 0, vec![1.0, 0.1, 0.0]),
            make_entry("mid", "general", 0, vec![0.7, 0.7, 0.0]),
        ];
        let opts = SearchOptions::default();

        let results = rank(entries.iter(), &[1.0, 0.0, 0.0], &opts);

        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_rank_tie_breaks_by_lower_id() {
        let entries = vec![
            make_entry("b", "general", 0, vec![1.0, 0.0, 0.0]),
            make_entry("a", "general", 0, vec![1.0, 0.0, 0.0]),
        ];
        let opts = SearchOptions::default();

        let results = rank(entries.iter(), &[1.0, 0.0, 0.0], &opts);

        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "b");
    }

    #[test]
    fn test_threshold_excludes_low_scores() {
        let entries = vec![
            make_entry("hit", "general", 0, vec![1.0, 0.05, 0.0]),
            make_entry("miss", "general", 0, vec![0.5, 0.9, 0.0]),
        ];
        let opts = SearchOptions {
            threshold: 0.9,
            ..Default::default()
        };

        let results = rank(entries.iter(), &[1.0, 0.0, 0.0], &opts);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "hit");
    }

    #[test]
    fn test_min_priority_filters_before_scoring() {
        let entries = vec![
            make_entry("low", "general", 1, vec![1.0, 0.0, 0.0]),
            make_entry("high", "general", 5, vec![0.9, 0.1, 0.0]),
        ];
        let opts = SearchOptions {
            min_priority: Some(3),
            ..Default::default()
        };

        let results = rank(entries.iter(), &[1.0, 0.0, 0.0], &opts);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "high");
    }

    #[test]
    fn test_boost_reorders_but_cannot_rescue() {
        // "boosted" clears the threshold on raw similarity and overtakes
        // "plain" after the boost; "rescued" is below threshold and the boost
        // must not bring it back.
        let entries = vec![
            make_entry("plain", "general", 0, vec![1.0, 0.1, 0.0]),
            make_entry("boosted", "patterns", 0, vec![0.9, 0.25, 0.0]),
            make_entry("rescued", "patterns", 0, vec![0.3, 1.0, 0.0]),
        ];
        let opts = SearchOptions {
            threshold: 0.9,
            boost: Some(HashMap::from([("patterns".to_string(), 1.5)])),
            ..Default::default()
        };

        let results = rank(entries.iter(), &[1.0, 0.0, 0.0], &opts);

        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["boosted", "plain"]);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[test]
    fn test_max_results_truncates() {
        let entries: Vec<MemoryEntry> = (0..20)
            .map(|i| make_entry(&format!("e{i:02}"), "general", 0, vec![1.0, i as f32, 0.0]))
            .collect();
        let opts = SearchOptions {
            max_results: 5,
            ..Default::default()
        };

        let results = rank(entries.iter(), &[1.0, 0.0, 0.0], &opts);

        assert_eq!(results.len(), 5);
    }
}
