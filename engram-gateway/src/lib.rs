//! Engram Sharing Gateway
//!
//! Cross-tenant layer over per-tenant [`engram_memory::MemoryStore`]
//! instances: a tenant registry, access-controlled sharing with optional
//! expiry, and best-effort broadcast fan-out.
//!
//! Sharing copies, never aliases: the payload is materialized into the
//! recipient's own store (with its own embedding and id) so revoking or
//! expiring the share record leaves the recipient's local copy intact.
//!
//! ## Example
//!
//! ```ignore
//! use engram_gateway::{AccessLevel, SharingGateway, TenantConfig, TenantId, TenantRegistry};
//!
//! let registry = Arc::new(TenantRegistry::new());
//! registry.register(TenantConfig::new("planner"), planner_store);
//! registry.register(TenantConfig::new("reviewer"), reviewer_store);
//!
//! let gateway = SharingGateway::new(registry);
//! let key = gateway
//!     .share_between(
//!         &TenantId::from("planner"),
//!         &TenantId::from("reviewer"),
//!         "flaky test: retry ui suite once before failing",
//!         AccessLevel::Read,
//!         Some(86_400_000),
//!     )
//!     .await?;
//! ```

pub mod error;
pub mod gateway;
pub mod registry;
pub mod share;

// Re-exports for convenience
pub use error::GatewayError;
pub use gateway::{GatewayEvent, GatewayStats, SharingGateway};
pub use registry::{TenantConfig, TenantHandle, TenantId, TenantRegistry};
pub use share::{AccessLevel, SharedEntry};
