//! Shared entry records
//!
//! A share is a visibility record between exactly two tenants, holding its
//! own copy of the payload. The payload is additionally materialized into the
//! target's store at share time; this record only governs cross-tenant
//! lookup and expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::TenantId;

/// Category the materialized copy lands under in the target store
pub const SHARED_CATEGORY: &str = "shared";

/// Access granted to the target tenant on a shared entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

/// Cross-tenant visibility record with optional expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedEntry {
    /// Globally unique `source:target:millis` key
    pub shared_key: String,
    pub source_id: TenantId,
    pub target_id: TenantId,
    pub access_level: AccessLevel,
    /// Copy of the shared content (no embedding; the target re-embeds)
    pub payload: String,
    pub created_at: DateTime<Utc>,
    /// Time to live; `None` means no expiry
    pub ttl_millis: Option<u64>,
}

impl SharedEntry {
    /// Only the two parties of the share may read it
    pub fn visible_to(&self, tenant: &TenantId) -> bool {
        tenant == &self.source_id || tenant == &self.target_id
    }

    /// Whether the ttl has elapsed at `now`
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_millis {
            Some(ttl) => (now - self.created_at).num_milliseconds() > ttl as i64,
            None => false,
        }
    }
}

/// Derive the wire key for a share created at `millis`
pub(crate) fn derive_key(source: &TenantId, target: &TenantId, millis: i64) -> String {
    format!("{source}:{target}:{millis}")
}
