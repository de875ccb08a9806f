//! Error types for engram-gateway

use thiserror::Error;

use crate::registry::TenantId;

/// Errors that can occur at the sharing layer
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Tenant id is not registered
    #[error("unknown tenant: {0}")]
    UnknownTenant(TenantId),

    /// Tenant is neither source nor target of the share
    #[error("tenant '{tenant}' may not access share '{shared_key}'")]
    AccessDenied { tenant: TenantId, shared_key: String },

    /// No share record under this key
    #[error("share not found: {0}")]
    ShareNotFound(String),

    /// Underlying store error (e.g. the target is at capacity)
    #[error("store error: {0}")]
    Memory(#[from] engram_memory::MemoryError),
}

impl GatewayError {
    /// Create an unknown tenant error
    pub fn unknown_tenant(id: &TenantId) -> Self {
        Self::UnknownTenant(id.clone())
    }

    /// Create an access denied error
    pub fn access_denied(tenant: &TenantId, shared_key: impl Into<String>) -> Self {
        Self::AccessDenied {
            tenant: tenant.clone(),
            shared_key: shared_key.into(),
        }
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
