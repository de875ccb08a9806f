//! Tenant registry
//!
//! Maps tenant ids to their own capacity-bounded store plus a domain
//! affinity. Registration and deregistration are the only ways in and out;
//! eviction inside a store never unregisters its tenant.

use dashmap::DashMap;
use engram_memory::MemoryStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unique identifier for a registered tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Registration-time description of a tenant
#[derive(Debug, Clone)]
pub struct TenantConfig {
    pub id: TenantId,
    /// Categories this tenant's domain gravitates to
    pub domains: Vec<String>,
}

impl TenantConfig {
    pub fn new(id: impl Into<TenantId>) -> Self {
        Self {
            id: id.into(),
            domains: Vec::new(),
        }
    }

    /// Add a domain category affinity
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domains.push(domain.into());
        self
    }
}

/// One registered tenant and its store
pub struct TenantHandle {
    pub config: TenantConfig,
    pub store: Arc<MemoryStore>,
}

/// Registry of all tenants known to the gateway
#[derive(Default)]
pub struct TenantRegistry {
    tenants: DashMap<TenantId, Arc<TenantHandle>>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tenant with its own store. Re-registering an id replaces
    /// the previous handle.
    pub fn register(&self, config: TenantConfig, store: Arc<MemoryStore>) {
        let id = config.id.clone();
        let replaced = self
            .tenants
            .insert(id.clone(), Arc::new(TenantHandle { config, store }))
            .is_some();
        if replaced {
            tracing::warn!(tenant = %id, "tenant re-registered, previous store handle dropped");
        } else {
            tracing::info!(tenant = %id, "tenant registered");
        }
    }

    /// Remove a tenant; returns whether it was registered
    pub fn deregister(&self, id: &TenantId) -> bool {
        let removed = self.tenants.remove(id).is_some();
        if removed {
            tracing::info!(tenant = %id, "tenant deregistered");
        }
        removed
    }

    /// Look up a tenant's handle
    pub fn get(&self, id: &TenantId) -> Option<Arc<TenantHandle>> {
        self.tenants.get(id).map(|h| Arc::clone(h.value()))
    }

    pub fn contains(&self, id: &TenantId) -> bool {
        self.tenants.contains_key(id)
    }

    /// Ids of all registered tenants
    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenants.iter().map(|h| h.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}
