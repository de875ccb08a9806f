//! Injectable time source
//!
//! Background sweeps, TTL expiry, and age-decay scoring all read time through
//! a [`Clock`] so tests can drive it deterministically instead of sleeping.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// A source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests
pub struct ManualClock {
    current: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at the given instant
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: RwLock::new(start),
        }
    }

    /// Create a clock frozen at the current wall-clock time
    pub fn from_now() -> Self {
        Self::new(Utc::now())
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.write();
        *current = *current + by;
    }

    /// Jump the clock to a specific instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.current.write() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read()
    }
}
