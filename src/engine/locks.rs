use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use uuid::Uuid;

/// One mutex per trip id. Every mutating path for a trip runs inside
/// [`TripLocks::with_lock`], so load-decide-commit is serialized per trip
/// while different trips proceed in parallel.
#[derive(Default)]
pub struct TripLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl TripLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock<T>(&self, trip_id: Uuid, f: impl FnOnce() -> T) -> T {
        let lock = self.locks.entry(trip_id).or_default().value().clone();
        // The guarded value is `()`; a panic elsewhere cannot leave it inconsistent.
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Drops the mutex for a trip nobody is waiting on, e.g. once it is terminal.
    pub fn forget_if_idle(&self, trip_id: Uuid) {
        self.locks
            .remove_if(&trip_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
