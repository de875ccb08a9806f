//! Observable store events
//!
//! Observers exist for monitoring only; anything a caller must act on is a
//! return value. Correctness never depends on whether an observer is attached.

use parking_lot::RwLock;
use std::sync::Arc;

/// Side effects a store makes observable
#[derive(Debug, Clone)]
pub enum MemoryEvent {
    /// An entry was inserted or overwritten
    EntryStored { id: String, size_bytes: u64 },
    /// An entry was removed by an eviction policy
    EntryEvicted { id: String, size_bytes: u64 },
    /// Utilization crossed the high-water mark
    CapacityPressure { utilization_percent: f64 },
}

/// Registered observer callback
pub type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A set of observer callbacks for one event type
pub struct ObserverSet<E> {
    observers: RwLock<Vec<Observer<E>>>,
}

impl<E> Default for ObserverSet<E> {
    fn default() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }
}

impl<E> ObserverSet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked for every emitted event
    pub fn register(&self, observer: Observer<E>) {
        self.observers.write().push(observer);
    }

    /// Deliver an event to all registered observers
    pub fn emit(&self, event: &E) {
        for observer in self.observers.read().iter() {
            observer(event);
        }
    }
}
