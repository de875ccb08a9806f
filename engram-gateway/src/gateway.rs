//! Sharing gateway
//!
//! Coordinates shares between per-tenant stores. Every share copies the
//! payload into the target's own store, then records a `SharedEntry` that
//! governs cross-tenant lookup and expiry. Operations on different tenants
//! are independent; there is no global ordering across stores.

use chrono::Duration as ChronoDuration;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use engram_memory::{Observer, ObserverSet, PutRequest, SharedClock, SystemClock};

use crate::error::{GatewayError, Result};
use crate::registry::{TenantHandle, TenantId, TenantRegistry};
use crate::share::{derive_key, AccessLevel, SharedEntry, SHARED_CATEGORY};

/// Default cadence of the background expiry sweep
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Shares created within this window count as recent in stats
const RECENT_WINDOW_MILLIS: i64 = 3_600_000;

/// Side effects the gateway makes observable
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A share record was created
    ShareCreated {
        shared_key: String,
        source: TenantId,
        target: TenantId,
    },
    /// A share record was removed by the expiry sweep
    ShareExpired { shared_key: String },
    /// A tenant outside the share requested it
    AccessDenied { shared_key: String, tenant: TenantId },
}

/// Cross-tenant sharing gateway
pub struct SharingGateway {
    registry: Arc<TenantRegistry>,
    shares: DashMap<String, SharedEntry>,
    clock: SharedClock,
    observers: ObserverSet<GatewayEvent>,
    total_shares: AtomicU64,
    sweep_interval: Duration,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SharingGateway {
    /// Create a gateway with the system clock and default sweep cadence
    pub fn new(registry: Arc<TenantRegistry>) -> Arc<Self> {
        Self::with_parts(registry, Arc::new(SystemClock), DEFAULT_SWEEP_INTERVAL)
    }

    /// Create a gateway with explicit clock and sweep cadence
    pub fn with_parts(
        registry: Arc<TenantRegistry>,
        clock: SharedClock,
        sweep_interval: Duration,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            registry,
            shares: DashMap::new(),
            clock,
            observers: ObserverSet::new(),
            total_shares: AtomicU64::new(0),
            sweep_interval,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// The registry this gateway coordinates
    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    /// Register a monitoring observer
    pub fn subscribe(&self, observer: Observer<GatewayEvent>) {
        self.observers.register(observer);
    }

    fn handle(&self, id: &TenantId) -> Result<Arc<TenantHandle>> {
        self.registry
            .get(id)
            .ok_or_else(|| GatewayError::unknown_tenant(id))
    }

    /// Share a payload from `source` to `target`.
    ///
    /// The payload is materialized into the target's store first (it embeds
    /// and budgets the copy like any local put), then the share record is
    /// written. Returns the record's key.
    pub async fn share_between(
        &self,
        source: &TenantId,
        target: &TenantId,
        payload: &str,
        access_level: AccessLevel,
        ttl_millis: Option<u64>,
    ) -> Result<String> {
        self.handle(source)?;
        let target_handle = self.handle(target)?;

        target_handle
            .store
            .put(PutRequest::new(payload).category(SHARED_CATEGORY))
            .await?;

        let now = self.clock.now();
        let mut millis = now.timestamp_millis();
        // Same-millisecond shares between the same pair bump the millis
        // component until the key is free; the key format stays stable.
        let shared_key = loop {
            let key = derive_key(source, target, millis);
            match self.shares.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(SharedEntry {
                        shared_key: key.clone(),
                        source_id: source.clone(),
                        target_id: target.clone(),
                        access_level,
                        payload: payload.to_string(),
                        created_at: now,
                        ttl_millis,
                    });
                    break key;
                }
                Entry::Occupied(_) => millis += 1,
            }
        };

        self.total_shares.fetch_add(1, Ordering::Relaxed);
        info!(share = %shared_key, source = %source, target = %target, ttl_millis, "share created");
        self.observers.emit(&GatewayEvent::ShareCreated {
            shared_key: shared_key.clone(),
            source: source.clone(),
            target: target.clone(),
        });

        Ok(shared_key)
    }

    /// Read a share's payload. Only the share's source and target may.
    pub fn get_shared(&self, tenant: &TenantId, shared_key: &str) -> Result<String> {
        let share = self
            .shares
            .get(shared_key)
            .ok_or_else(|| GatewayError::ShareNotFound(shared_key.to_string()))?;

        if !share.visible_to(tenant) {
            debug!(share = %shared_key, tenant = %tenant, "access denied");
            self.observers.emit(&GatewayEvent::AccessDenied {
                shared_key: shared_key.to_string(),
                tenant: tenant.clone(),
            });
            return Err(GatewayError::access_denied(tenant, shared_key));
        }

        Ok(share.payload.clone())
    }

    /// Explicitly remove a share record; returns whether it existed. The
    /// target's materialized copy is untouched.
    pub fn revoke(&self, shared_key: &str) -> bool {
        let removed = self.shares.remove(shared_key).is_some();
        if removed {
            info!(share = %shared_key, "share revoked");
        }
        removed
    }

    /// Fan a payload out to every registered tenant except the source.
    ///
    /// Best-effort: a recipient at capacity is skipped and reported by
    /// omission from the returned key list, the rest still receive.
    pub async fn broadcast(
        &self,
        source: &TenantId,
        payload: &str,
        access_level: AccessLevel,
        ttl_millis: Option<u64>,
    ) -> Result<Vec<String>> {
        self.handle(source)?;

        let mut keys = Vec::new();
        for target in self.registry.tenant_ids() {
            if &target == source {
                continue;
            }
            match self
                .share_between(source, &target, payload, access_level, ttl_millis)
                .await
            {
                Ok(key) => keys.push(key),
                Err(e) => {
                    warn!(source = %source, target = %target, error = %e, "broadcast recipient skipped");
                }
            }
        }
        Ok(keys)
    }

    /// Remove every share whose ttl has elapsed. Idempotent and safe to run
    /// concurrently with itself; returns how many this call removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let candidates: Vec<String> = self
            .shares
            .iter()
            .filter(|r| r.value().expired(now))
            .map(|r| r.key().clone())
            .collect();

        let mut removed = 0;
        for key in candidates {
            if self
                .shares
                .remove_if(&key, |_, share| share.expired(now))
                .is_some()
            {
                removed += 1;
                debug!(share = %key, "share expired");
                self.observers
                    .emit(&GatewayEvent::ShareExpired { shared_key: key });
            }
        }

        if removed > 0 {
            info!(removed, "expiry sweep removed shares");
        }
        removed
    }

    /// Gateway statistics surface
    pub fn stats(&self) -> GatewayStats {
        let now = self.clock.now();
        let recent_cutoff = now - ChronoDuration::milliseconds(RECENT_WINDOW_MILLIS);
        let recent_shares = self
            .shares
            .iter()
            .filter(|r| r.value().created_at >= recent_cutoff)
            .count();

        GatewayStats {
            registered_tenants: self.registry.len(),
            total_shares: self.total_shares.load(Ordering::Relaxed),
            recent_shares,
        }
    }

    /// Start the background expiry sweep. Idempotent while running.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }
        self.shutdown.send_replace(false);

        let gateway = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(gateway.sweep_interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        gateway.sweep_expired();
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }));
    }

    /// Stop the background sweep without touching in-flight tenant state
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// Gateway statistics
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStats {
    pub registered_tenants: usize,
    pub total_shares: u64,
    pub recent_shares: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TenantConfig;
    use engram_memory::{
        DeterministicEmbedder, EmbeddingEngine, ManualClock, MemoryStore, RecencyPolicy,
        SearchOptions, StoreConfig,
    };

    const DIM: usize = 64;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn make_store(clock: Arc<ManualClock>, max_size_bytes: u64) -> Arc<MemoryStore> {
        let engine = EmbeddingEngine::new(Arc::new(DeterministicEmbedder::new(DIM)));
        MemoryStore::with_parts(
            StoreConfig::new(max_size_bytes),
            engine,
            Arc::new(RecencyPolicy),
            clock,
            None,
        )
    }

    /// Registry with tenants "planner", "reviewer", "researcher" sharing one
    /// manual clock
    fn make_gateway() -> (Arc<SharingGateway>, Arc<ManualClock>) {
        init_tracing();
        let clock = Arc::new(ManualClock::from_now());
        let registry = Arc::new(TenantRegistry::new());
        for id in ["planner", "reviewer", "researcher"] {
            registry.register(TenantConfig::new(id), make_store(clock.clone(), 100_000));
        }
        let gateway = SharingGateway::with_parts(registry, clock.clone(), Duration::from_secs(5));
        (gateway, clock)
    }

    fn tenant(id: &str) -> TenantId {
        TenantId::from(id)
    }

    #[tokio::test]
    async fn test_share_materializes_copy_in_target_store() {
        let (gateway, _) = make_gateway();

        let key = gateway
            .share_between(
                &tenant("planner"),
                &tenant("reviewer"),
                "flaky ui suite: retry once before failing",
                AccessLevel::Read,
                None,
            )
            .await
            .unwrap();
        assert!(key.starts_with("planner:reviewer:"));

        // The reviewer can search the copy like any local entry
        let reviewer = gateway.registry().get(&tenant("reviewer")).unwrap();
        let hits = reviewer
            .store
            .search(
                "flaky ui suite: retry once before failing",
                &SearchOptions {
                    category: Some(SHARED_CATEGORY.to_string()),
                    threshold: 0.9,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_share_unknown_tenant_fails() {
        let (gateway, _) = make_gateway();

        let err = gateway
            .share_between(
                &tenant("ghost"),
                &tenant("reviewer"),
                "p",
                AccessLevel::Read,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownTenant(_)));

        let err = gateway
            .share_between(
                &tenant("planner"),
                &tenant("ghost"),
                "p",
                AccessLevel::Read,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownTenant(_)));
    }

    #[tokio::test]
    async fn test_get_shared_visible_to_both_parties_only() {
        let (gateway, _) = make_gateway();
        let key = gateway
            .share_between(
                &tenant("planner"),
                &tenant("reviewer"),
                "the payload",
                AccessLevel::Read,
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            gateway.get_shared(&tenant("planner"), &key).unwrap(),
            "the payload"
        );
        assert_eq!(
            gateway.get_shared(&tenant("reviewer"), &key).unwrap(),
            "the payload"
        );

        let err = gateway
            .get_shared(&tenant("researcher"), &key)
            .unwrap_err();
        assert!(matches!(err, GatewayError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_access_denied_emits_event() {
        use std::sync::atomic::AtomicUsize;

        let (gateway, _) = make_gateway();
        let denials = Arc::new(AtomicUsize::new(0));
        {
            let denials = Arc::clone(&denials);
            gateway.subscribe(Arc::new(move |event| {
                if matches!(event, GatewayEvent::AccessDenied { .. }) {
                    denials.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        let key = gateway
            .share_between(
                &tenant("planner"),
                &tenant("reviewer"),
                "p",
                AccessLevel::Read,
                None,
            )
            .await
            .unwrap();

        let _ = gateway.get_shared(&tenant("researcher"), &key);

        assert_eq!(denials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_shared_missing_key_is_not_found() {
        let (gateway, _) = make_gateway();

        let err = gateway
            .get_shared(&tenant("planner"), "planner:reviewer:0")
            .unwrap_err();

        assert!(matches!(err, GatewayError::ShareNotFound(_)));
    }

    #[tokio::test]
    async fn test_same_millisecond_shares_get_distinct_keys() {
        let (gateway, _) = make_gateway();

        // The manual clock is frozen, so both shares land on the same millis
        let k1 = gateway
            .share_between(&tenant("planner"), &tenant("reviewer"), "one", AccessLevel::Read, None)
            .await
            .unwrap();
        let k2 = gateway
            .share_between(&tenant("planner"), &tenant("reviewer"), "two", AccessLevel::Read, None)
            .await
            .unwrap();

        assert_ne!(k1, k2);
        assert_eq!(gateway.get_shared(&tenant("planner"), &k1).unwrap(), "one");
        assert_eq!(gateway.get_shared(&tenant("planner"), &k2).unwrap(), "two");
    }

    #[tokio::test]
    async fn test_ttl_sweep_removes_expired_share() {
        let (gateway, clock) = make_gateway();
        let key = gateway
            .share_between(
                &tenant("planner"),
                &tenant("reviewer"),
                "short lived",
                AccessLevel::Read,
                Some(100),
            )
            .await
            .unwrap();

        clock.advance(ChronoDuration::milliseconds(50));
        assert_eq!(gateway.sweep_expired(), 0);
        assert!(gateway.get_shared(&tenant("reviewer"), &key).is_ok());

        clock.advance(ChronoDuration::milliseconds(150));
        assert_eq!(gateway.sweep_expired(), 1);

        let err = gateway.get_shared(&tenant("reviewer"), &key).unwrap_err();
        assert!(matches!(err, GatewayError::ShareNotFound(_)));
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let (gateway, clock) = make_gateway();
        for payload in ["one", "two"] {
            gateway
                .share_between(
                    &tenant("planner"),
                    &tenant("reviewer"),
                    payload,
                    AccessLevel::Read,
                    Some(100),
                )
                .await
                .unwrap();
        }

        clock.advance(ChronoDuration::milliseconds(200));

        assert_eq!(gateway.sweep_expired(), 2);
        assert_eq!(gateway.sweep_expired(), 0);
    }

    #[tokio::test]
    async fn test_share_without_ttl_survives_sweep() {
        let (gateway, clock) = make_gateway();
        let key = gateway
            .share_between(
                &tenant("planner"),
                &tenant("reviewer"),
                "durable",
                AccessLevel::Admin,
                None,
            )
            .await
            .unwrap();

        clock.advance(ChronoDuration::days(365));

        assert_eq!(gateway.sweep_expired(), 0);
        assert!(gateway.get_shared(&tenant("planner"), &key).is_ok());
    }

    #[tokio::test]
    async fn test_expiry_leaves_materialized_copy_intact() {
        let (gateway, clock) = make_gateway();
        gateway
            .share_between(
                &tenant("planner"),
                &tenant("reviewer"),
                "keep the local copy",
                AccessLevel::Read,
                Some(100),
            )
            .await
            .unwrap();

        clock.advance(ChronoDuration::milliseconds(200));
        gateway.sweep_expired();

        let reviewer = gateway.registry().get(&tenant("reviewer")).unwrap();
        assert_eq!(reviewer.store.list(Some(SHARED_CATEGORY)).len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_removes_record_not_copy() {
        let (gateway, _) = make_gateway();
        let key = gateway
            .share_between(
                &tenant("planner"),
                &tenant("reviewer"),
                "revocable",
                AccessLevel::Write,
                None,
            )
            .await
            .unwrap();

        assert!(gateway.revoke(&key));
        assert!(!gateway.revoke(&key));
        assert!(matches!(
            gateway.get_shared(&tenant("planner"), &key),
            Err(GatewayError::ShareNotFound(_))
        ));

        let reviewer = gateway.registry().get(&tenant("reviewer")).unwrap();
        assert_eq!(reviewer.store.list(Some(SHARED_CATEGORY)).len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_but_source() {
        let (gateway, _) = make_gateway();

        let keys = gateway
            .broadcast(&tenant("planner"), "for everyone", AccessLevel::Read, None)
            .await
            .unwrap();

        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| !k.contains("planner:planner")));
        for id in ["reviewer", "researcher"] {
            let handle = gateway.registry().get(&tenant(id)).unwrap();
            assert_eq!(handle.store.list(Some(SHARED_CATEGORY)).len(), 1);
        }
    }

    #[tokio::test]
    async fn test_broadcast_skips_full_recipient_by_omission() {
        init_tracing();
        let clock = Arc::new(ManualClock::from_now());
        let registry = Arc::new(TenantRegistry::new());
        registry.register(TenantConfig::new("planner"), make_store(clock.clone(), 100_000));
        registry.register(TenantConfig::new("reviewer"), make_store(clock.clone(), 100_000));
        // Too small for even an empty-content entry
        registry.register(TenantConfig::new("cramped"), make_store(clock.clone(), 64));
        let gateway = SharingGateway::with_parts(registry, clock, Duration::from_secs(5));

        let keys = gateway
            .broadcast(&tenant("planner"), "payload", AccessLevel::Read, None)
            .await
            .unwrap();

        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("planner:reviewer:"));
    }

    #[tokio::test]
    async fn test_broadcast_unknown_source_fails() {
        let (gateway, _) = make_gateway();

        let err = gateway
            .broadcast(&tenant("ghost"), "p", AccessLevel::Read, None)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::UnknownTenant(_)));
    }

    #[tokio::test]
    async fn test_stats_track_tenants_and_shares() {
        let (gateway, clock) = make_gateway();
        gateway
            .share_between(&tenant("planner"), &tenant("reviewer"), "a", AccessLevel::Read, Some(100))
            .await
            .unwrap();
        gateway
            .share_between(&tenant("planner"), &tenant("researcher"), "b", AccessLevel::Read, None)
            .await
            .unwrap();

        let stats = gateway.stats();
        assert_eq!(stats.registered_tenants, 3);
        assert_eq!(stats.total_shares, 2);
        assert_eq!(stats.recent_shares, 2);

        // Expiry removes one record; the lifetime counter keeps it
        clock.advance(ChronoDuration::milliseconds(200));
        gateway.sweep_expired();
        let stats = gateway.stats();
        assert_eq!(stats.total_shares, 2);
        assert_eq!(stats.recent_shares, 1);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["registered_tenants"], 3);
        assert_eq!(json["total_shares"], 2);
    }

    #[tokio::test]
    async fn test_start_and_stop_terminate_cleanly() {
        let (gateway, _) = make_gateway();

        gateway.start();
        gateway.start(); // idempotent while running
        gateway.stop().await;
    }
}
