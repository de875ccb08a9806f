//! Capacity-governed memory store
//!
//! One store per tenant. All entry state (map, category index, size counter)
//! lives behind a single mutex so size accounting is linearizable; the
//! embedding call is awaited before the lock is taken and the lock is never
//! held across an await. Background sweeps and snapshots are explicit
//! `start`/`stop` lifecycle, not constructor side effects.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::clock::{SharedClock, SystemClock};
use crate::embedding::EmbeddingEngine;
use crate::entry::{entry_size_bytes, MemoryEntry, PutRequest, DEFAULT_CATEGORY};
use crate::error::{MemoryError, Result};
use crate::events::{MemoryEvent, Observer, ObserverSet};
use crate::eviction::EvictionPolicy;
use crate::index::CategoryIndex;
use crate::persist::{BlobSink, Snapshot, SNAPSHOT_VERSION};
use crate::search::{rank, SearchOptions, SearchResult};

/// Store tuning knobs
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Hard byte ceiling, fixed at creation
    pub max_size_bytes: u64,
    /// Utilization fraction that counts as capacity pressure (default 0.90)
    pub high_water: f64,
    /// Fraction the background sweep and `gc` evict down to (default 0.80)
    pub evict_target: f64,
    /// Cadence of the background pressure sweep (default 30s)
    pub sweep_interval: Duration,
    /// Cadence of the periodic snapshot (default 60s)
    pub snapshot_interval: Duration,
    /// Blob key the snapshot is stored under
    pub snapshot_key: String,
}

impl StoreConfig {
    pub fn new(max_size_bytes: u64) -> Self {
        Self {
            max_size_bytes,
            high_water: 0.90,
            evict_target: 0.80,
            sweep_interval: Duration::from_secs(30),
            snapshot_interval: Duration::from_secs(60),
            snapshot_key: "engram.snapshot".to_string(),
        }
    }

    /// Store the snapshot under a different blob key
    pub fn with_snapshot_key(mut self, key: impl Into<String>) -> Self {
        self.snapshot_key = key.into();
        self
    }
}

/// Everything the size-accounting invariant covers, behind one mutex
#[derive(Default)]
struct StoreInner {
    entries: HashMap<String, MemoryEntry>,
    index: CategoryIndex,
    current_size: u64,
    above_high_water: bool,
}

impl StoreInner {
    fn remove_entry(&mut self, id: &str) -> Option<MemoryEntry> {
        let entry = self.entries.remove(id)?;
        self.index.remove(&entry.category, &entry.id);
        self.current_size -= entry.size_bytes;
        Some(entry)
    }

    fn insert_entry(&mut self, entry: MemoryEntry) {
        self.index.insert(&entry.category, &entry.id);
        self.current_size += entry.size_bytes;
        self.entries.insert(entry.id.clone(), entry);
    }
}

/// Bounded embedding store
pub struct MemoryStore {
    config: StoreConfig,
    inner: Mutex<StoreInner>,
    engine: Arc<EmbeddingEngine>,
    policy: Arc<dyn EvictionPolicy>,
    clock: SharedClock,
    sink: Option<Arc<dyn BlobSink>>,
    observers: ObserverSet<MemoryEvent>,
    snapshot_tx: mpsc::Sender<()>,
    snapshot_rx: Mutex<Option<mpsc::Receiver<()>>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MemoryStore {
    /// Create an in-memory store with the system clock and no persistence
    pub fn new(
        config: StoreConfig,
        engine: Arc<EmbeddingEngine>,
        policy: Arc<dyn EvictionPolicy>,
    ) -> Arc<Self> {
        Self::with_parts(config, engine, policy, Arc::new(SystemClock), None)
    }

    /// Create a store with explicit clock and optional blob sink.
    ///
    /// When a sink is given, the previous snapshot is loaded; a missing or
    /// corrupt snapshot yields an empty store, never an error.
    pub fn with_parts(
        config: StoreConfig,
        engine: Arc<EmbeddingEngine>,
        policy: Arc<dyn EvictionPolicy>,
        clock: SharedClock,
        sink: Option<Arc<dyn BlobSink>>,
    ) -> Arc<Self> {
        let mut inner = StoreInner::default();
        if let Some(sink) = &sink {
            Self::load_snapshot(&config, sink, engine.dimension(), &mut inner);
        }

        let (snapshot_tx, snapshot_rx) = mpsc::channel(1);
        let (shutdown, _) = watch::channel(false);

        Arc::new(Self {
            config,
            inner: Mutex::new(inner),
            engine,
            policy,
            clock,
            sink,
            observers: ObserverSet::new(),
            snapshot_tx,
            snapshot_rx: Mutex::new(Some(snapshot_rx)),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        })
    }

    fn load_snapshot(
        config: &StoreConfig,
        sink: &Arc<dyn BlobSink>,
        dimension: usize,
        inner: &mut StoreInner,
    ) {
        let bytes = match sink.read_blob(&config.snapshot_key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                log::warn!("snapshot read failed ({e}), starting empty");
                return;
            }
        };

        let Some(snapshot) = Snapshot::decode(&bytes) else {
            return;
        };

        let mut skipped = 0;
        for entry in snapshot.entries {
            if entry.embedding.len() != dimension {
                skipped += 1;
                continue;
            }
            inner.insert_entry(entry);
        }
        if skipped > 0 {
            log::warn!("skipped {skipped} snapshot entries with a foreign dimension");
        }
        if inner.current_size != snapshot.current_size_bytes {
            log::warn!(
                "snapshot size counter {} disagrees with entry sum {}, using the sum",
                snapshot.current_size_bytes,
                inner.current_size
            );
        }
        log::info!(
            "loaded {} entries ({} bytes) from snapshot",
            inner.entries.len(),
            inner.current_size
        );
    }

    /// Fixed embedding dimension of this store
    pub fn dimension(&self) -> usize {
        self.engine.dimension()
    }

    /// The embedding engine backing this store
    pub fn engine(&self) -> &Arc<EmbeddingEngine> {
        &self.engine
    }

    /// Register a monitoring observer
    pub fn subscribe(&self, observer: Observer<MemoryEvent>) {
        self.observers.register(observer);
    }

    /// Store an entry, evicting as needed to fit it.
    ///
    /// Reusing an id overwrites that entry and adjusts the size counter by
    /// the delta in the same critical section. Fails with `CapacityExceeded`
    /// only when the entry cannot fit even into an empty store; the store is
    /// then untouched.
    pub async fn put(&self, req: PutRequest) -> Result<String> {
        let PutRequest {
            id,
            content,
            category,
            priority,
        } = req;
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let category = category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let size = entry_size_bytes(&content, self.dimension());
        if size > self.config.max_size_bytes {
            return Err(MemoryError::capacity_exceeded(
                size,
                self.config.max_size_bytes,
            ));
        }

        // Embed before taking the lock; a slow provider must not stall
        // concurrent readers of this store.
        let embedding = self.engine.embed(&content).await;
        let now = self.clock.now();

        let mut evicted = Vec::new();
        let pressure;
        {
            let mut inner = self.inner.lock();
            inner.remove_entry(&id);

            // `size <= max` was checked above, so this always ends with room.
            while inner.current_size + size > self.config.max_size_bytes {
                let Some(victim_id) = self.policy.select_victim(&inner.entries, now) else {
                    break;
                };
                match inner.remove_entry(&victim_id) {
                    Some(victim) => evicted.push(victim),
                    None => break,
                }
            }

            inner.insert_entry(MemoryEntry {
                id: id.clone(),
                content,
                embedding,
                size_bytes: size,
                category,
                priority,
                created_at: now,
                last_accessed_at: now,
                access_count: 0,
            });
            pressure = self.check_pressure(&mut inner);
        }

        for victim in &evicted {
            log::debug!("evicted '{}' ({} bytes) to fit put", victim.id, victim.size_bytes);
            self.observers.emit(&MemoryEvent::EntryEvicted {
                id: victim.id.clone(),
                size_bytes: victim.size_bytes,
            });
        }
        self.observers.emit(&MemoryEvent::EntryStored {
            id: id.clone(),
            size_bytes: size,
        });
        if let Some(utilization_percent) = pressure {
            self.observers
                .emit(&MemoryEvent::CapacityPressure { utilization_percent });
        }
        self.request_snapshot();

        Ok(id)
    }

    /// Get an entry by id, counting the read as a use
    pub fn get(&self, id: &str) -> Option<MemoryEntry> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let entry = inner.entries.get_mut(id)?;
        entry.touch(now);
        Some(entry.clone())
    }

    /// Delete an entry; returns whether it existed
    pub fn delete(&self, id: &str) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            let removed = inner.remove_entry(id).is_some();
            self.check_pressure(&mut inner);
            removed
        };
        if removed {
            self.request_snapshot();
        }
        removed
    }

    /// All entry ids, or the ids in one category. No implied ordering.
    pub fn list(&self, category: Option<&str>) -> Vec<String> {
        let inner = self.inner.lock();
        match category {
            Some(category) => inner
                .index
                .ids(category)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default(),
            None => inner.entries.keys().cloned().collect(),
        }
    }

    /// Embed the query text and rank entries against it
    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>> {
        let query_vector = self.engine.embed(query).await;
        self.search_embedding(&query_vector, opts)
    }

    /// Rank entries against a pre-computed query vector.
    ///
    /// Returned entries count as accessed. A query of the wrong dimension is
    /// a hard error, never a degraded comparison.
    pub fn search_embedding(
        &self,
        query: &[f32],
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension() {
            return Err(MemoryError::dimension_mismatch(
                self.dimension(),
                query.len(),
            ));
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let results = match &opts.category {
            Some(category) => match inner.index.ids(category) {
                Some(ids) => {
                    let candidates = ids.iter().filter_map(|id| inner.entries.get(id));
                    rank(candidates, query, opts)
                }
                None => Vec::new(),
            },
            None => rank(inner.entries.values(), query, opts),
        };

        for hit in &results {
            if let Some(entry) = inner.entries.get_mut(&hit.id) {
                entry.touch(now);
            }
        }

        Ok(results)
    }

    /// Evict down to the target headroom. Returns `(evicted, freed_bytes)`.
    /// Never errors; an empty or already-fitting store evicts nothing.
    pub fn gc(&self) -> (usize, u64) {
        let now = self.clock.now();
        let target = (self.config.max_size_bytes as f64 * self.config.evict_target) as u64;

        let mut evicted = Vec::new();
        {
            let mut inner = self.inner.lock();
            while inner.current_size > target {
                let Some(victim_id) = self.policy.select_victim(&inner.entries, now) else {
                    break;
                };
                match inner.remove_entry(&victim_id) {
                    Some(victim) => evicted.push(victim),
                    None => break,
                }
            }
            self.check_pressure(&mut inner);
        }

        let freed: u64 = evicted.iter().map(|e| e.size_bytes).sum();
        for victim in &evicted {
            self.observers.emit(&MemoryEvent::EntryEvicted {
                id: victim.id.clone(),
                size_bytes: victim.size_bytes,
            });
        }
        if !evicted.is_empty() {
            log::info!(
                "gc evicted {} entries, freed {} bytes ({} policy)",
                evicted.len(),
                freed,
                self.policy.name()
            );
            self.request_snapshot();
        }

        (evicted.len(), freed)
    }

    /// Current store statistics
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            total_size_bytes: inner.current_size,
            entry_count: inner.entries.len(),
            utilization_percent: if self.config.max_size_bytes > 0 {
                inner.current_size as f64 / self.config.max_size_bytes as f64 * 100.0
            } else {
                0.0
            },
            max_size_bytes: self.config.max_size_bytes,
        }
    }

    /// Write a snapshot synchronously. Called by the background task and at
    /// shutdown; mutating operations only ever trigger it fire-and-forget.
    pub fn snapshot_now(&self) -> Result<()> {
        let Some(sink) = &self.sink else {
            return Ok(());
        };

        let snapshot = {
            let inner = self.inner.lock();
            Snapshot {
                version: SNAPSHOT_VERSION,
                entries: inner.entries.values().cloned().collect(),
                current_size_bytes: inner.current_size,
                taken_at: self.clock.now(),
            }
        };

        let bytes = snapshot.encode()?;
        sink.write_blob(&self.config.snapshot_key, &bytes)?;
        Ok(())
    }

    /// Start the background pressure sweep and snapshot tasks. Idempotent
    /// while running; a stopped store can be started again.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }
        self.shutdown.send_replace(false);

        {
            let store = Arc::clone(self);
            let mut shutdown = self.shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut tick = tokio::time::interval(store.config.sweep_interval);
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            let stats = store.stats();
                            if stats.utilization_percent >= store.config.high_water * 100.0 {
                                let (count, freed) = store.gc();
                                log::info!("pressure sweep evicted {count} entries ({freed} bytes)");
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        if self.sink.is_some() {
            if let Some(mut requests) = self.snapshot_rx.lock().take() {
                let store = Arc::clone(self);
                let mut shutdown = self.shutdown.subscribe();
                tasks.push(tokio::spawn(async move {
                    let mut tick = tokio::time::interval(store.config.snapshot_interval);
                    loop {
                        tokio::select! {
                            _ = tick.tick() => store.write_snapshot_logged(),
                            request = requests.recv() => match request {
                                Some(()) => store.write_snapshot_logged(),
                                None => break,
                            },
                            _ = shutdown.changed() => break,
                        }
                    }
                    // Hand the receiver back so a restart can resume draining.
                    *store.snapshot_rx.lock() = Some(requests);
                }));
            }
        }
    }

    /// Stop the background tasks and flush a final snapshot
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        self.write_snapshot_logged();
    }

    fn write_snapshot_logged(&self) {
        if let Err(e) = self.snapshot_now() {
            log::warn!("snapshot write failed: {e}");
        }
    }

    /// Nudge the snapshot task without blocking the caller
    fn request_snapshot(&self) {
        let _ = self.snapshot_tx.try_send(());
    }

    /// Latch utilization crossings of the high-water mark. Returns the
    /// percentage on an upward crossing so the caller can emit the event
    /// outside the lock.
    fn check_pressure(&self, inner: &mut StoreInner) -> Option<f64> {
        if self.config.max_size_bytes == 0 {
            return None;
        }
        let utilization = inner.current_size as f64 / self.config.max_size_bytes as f64;
        if utilization >= self.config.high_water {
            if !inner.above_high_water {
                inner.above_high_water = true;
                return Some(utilization * 100.0);
            }
        } else {
            inner.above_high_water = false;
        }
        None
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        let inner = self.inner.lock();
        let sum: u64 = inner.entries.values().map(|e| e.size_bytes).sum();
        assert_eq!(inner.current_size, sum, "size counter drifted from entries");
        assert!(
            inner.current_size <= self.config.max_size_bytes,
            "store over budget"
        );
        assert!(inner.index.verify(&inner.entries), "index out of sync");
    }
}

/// Per-store statistics surface
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_size_bytes: u64,
    pub entry_count: usize,
    pub utilization_percent: f64,
    pub max_size_bytes: u64,
}
