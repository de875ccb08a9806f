//! Memory entry types
//!
//! Core types for entries held by a store. Entries are owned exclusively by
//! the store that created them; cross-tenant sharing copies, never aliases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category bucket used when a put does not name one
pub const DEFAULT_CATEGORY: &str = "general";

/// Fixed per-entry metadata overhead charged against the size budget
pub const ENTRY_OVERHEAD_BYTES: u64 = 128;

/// Deterministic byte cost of an entry: utf-8 content bytes, four bytes per
/// embedding component, plus the fixed metadata overhead. Size accounting
/// must never drift from this formula.
pub fn entry_size_bytes(content: &str, dimension: usize) -> u64 {
    content.len() as u64 + (dimension as u64) * 4 + ENTRY_OVERHEAD_BYTES
}

/// One stored (content, embedding, metadata) tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique identifier within the owning store
    pub id: String,
    /// Text content
    pub content: String,
    /// Fixed-dimension embedding vector
    pub embedding: Vec<f32>,
    /// Derived byte cost, see [`entry_size_bytes`]
    pub size_bytes: u64,
    /// Category bucket
    pub category: String,
    /// Scoring input supplied by the caller
    pub priority: i32,
    /// When the entry was created
    pub created_at: DateTime<Utc>,
    /// When the entry was last read or returned from a search
    pub last_accessed_at: DateTime<Utc>,
    /// How many times the entry has been read or returned from a search
    pub access_count: u64,
}

impl MemoryEntry {
    /// Record a use of this entry
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }

    /// Age of the entry in fractional days at `now`
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds().max(0) as f64 / 86_400.0
    }
}

/// Parameters for storing an entry, built fluently
///
/// ```
/// use engram_memory::PutRequest;
///
/// let req = PutRequest::new("prefer small PRs over big-bang merges")
///     .id("pattern-017")
///     .category("task_patterns")
///     .priority(5);
/// ```
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub(crate) id: Option<String>,
    pub(crate) content: String,
    pub(crate) category: Option<String>,
    pub(crate) priority: i32,
}

impl PutRequest {
    /// Start a request for the given content
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            category: None,
            priority: 0,
        }
    }

    /// Set the entry id (a UUID is generated if not set). Reusing an existing
    /// id overwrites that entry.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the category bucket (defaults to [`DEFAULT_CATEGORY`])
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the priority scoring input
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_is_deterministic() {
        let a = entry_size_bytes("hello world", 256);
        let b = entry_size_bytes("hello world", 256);
        assert_eq!(a, b);
        assert_eq!(a, 11 + 256 * 4 + ENTRY_OVERHEAD_BYTES);
    }

    #[test]
    fn test_size_counts_utf8_bytes_not_chars() {
        // 'é' is two bytes in utf-8
        let size = entry_size_bytes("é", 4);
        assert_eq!(size, 2 + 16 + ENTRY_OVERHEAD_BYTES);
    }

    #[test]
    fn test_touch_updates_access_metadata() {
        let now = Utc::now();
        let mut entry = MemoryEntry {
            id: "a".into(),
            content: "content".into(),
            embedding: vec![0.0; 4],
            size_bytes: entry_size_bytes("content", 4),
            category: DEFAULT_CATEGORY.into(),
            priority: 0,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
        };

        let later = now + chrono::Duration::seconds(10);
        entry.touch(later);

        assert_eq!(entry.access_count, 1);
        assert_eq!(entry.last_accessed_at, later);
    }

    #[test]
    fn test_put_request_builder() {
        let req = PutRequest::new("content")
            .id("my-id")
            .category("observations")
            .priority(7);

        assert_eq!(req.id.as_deref(), Some("my-id"));
        assert_eq!(req.category.as_deref(), Some("observations"));
        assert_eq!(req.priority, 7);
    }

    #[test]
    fn test_entry_serialization_round_trip() {
        let now = Utc::now();
        let entry = MemoryEntry {
            id: "a".into(),
            content: "content".into(),
            embedding: vec![0.25, -0.5],
            size_bytes: entry_size_bytes("content", 2),
            category: "patterns".into(),
            priority: 3,
            created_at: now,
            last_accessed_at: now,
            access_count: 2,
        };

        let bytes = bincode::serialize(&entry).unwrap();
        let back: MemoryEntry = bincode::deserialize(&bytes).unwrap();
        assert_eq!(entry, back);
    }
}
