//! Category index
//!
//! Maps category names to the set of entry ids stored under them. Buckets are
//! created lazily on first insert and dropped when their last id is removed.
//! Every id in the index must exist in the entry map, and every live entry
//! appears in exactly one bucket; the store maintains both under its mutex.

use std::collections::{HashMap, HashSet};

use crate::entry::MemoryEntry;

/// Category -> set of entry ids
#[derive(Debug, Default, Clone)]
pub struct CategoryIndex {
    buckets: HashMap<String, HashSet<String>>,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an id to a category bucket
    pub fn insert(&mut self, category: &str, id: &str) {
        self.buckets
            .entry(category.to_string())
            .or_default()
            .insert(id.to_string());
    }

    /// Remove an id from a category bucket, dropping the bucket if emptied
    pub fn remove(&mut self, category: &str, id: &str) {
        if let Some(bucket) = self.buckets.get_mut(category) {
            bucket.remove(id);
            if bucket.is_empty() {
                self.buckets.remove(category);
            }
        }
    }

    /// Ids in one category, if the bucket exists
    pub fn ids(&self, category: &str) -> Option<&HashSet<String>> {
        self.buckets.get(category)
    }

    /// All category names with at least one entry
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Number of non-empty buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Check referential integrity against the entry map: every indexed id
    /// exists, every entry is indexed under its own category exactly once.
    pub fn verify(&self, entries: &HashMap<String, MemoryEntry>) -> bool {
        let indexed: usize = self.buckets.values().map(HashSet::len).sum();
        if indexed != entries.len() {
            return false;
        }
        entries.values().all(|entry| {
            self.buckets
                .get(&entry.category)
                .is_some_and(|bucket| bucket.contains(&entry.id))
        })
    }
}
