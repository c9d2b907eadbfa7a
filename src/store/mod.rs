//! Transactional persistence boundary for trips and their accounting rows.

pub mod memory;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::activation::TripActivationCheck;
use crate::models::ledger::{EmergencyUsage, LedgerEntry};
use crate::models::trip::{ScheduledTrip, TripStatus};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("trip {0} not found")]
    NotFound(Uuid),

    #[error("trip {0} already exists")]
    AlreadyExists(Uuid),

    #[error("trip {trip_id} changed concurrently (expected version {expected}, found {found})")]
    Conflict {
        trip_id: Uuid,
        expected: u64,
        found: u64,
    },

    #[error("emergency usage already recorded for trip {0}")]
    DuplicateEmergency(Uuid),

    #[error("point {point_id} does not belong to trip {trip_id}")]
    UnknownPoint { trip_id: Uuid, point_id: Uuid },
}

/// A single write inside a per-trip commit.
#[derive(Debug, Clone)]
pub enum TripWrite {
    PointReached {
        point_id: Uuid,
        at: DateTime<Utc>,
    },
    Status {
        status: TripStatus,
        at: DateTime<Utc>,
    },
    EmergencyFields {
        at: DateTime<Utc>,
        by: Uuid,
    },
    UpsertActivationCheck(TripActivationCheck),
    InsertEmergencyUsage(EmergencyUsage),
    InsertLedgerEntry(LedgerEntry),
}

/// Writes for one trip, applied all-or-nothing against `expected_version`.
#[derive(Debug, Clone)]
pub struct TripCommit {
    pub trip_id: Uuid,
    pub expected_version: u64,
    pub writes: Vec<TripWrite>,
}

impl TripCommit {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

pub trait TripStore: Send + Sync {
    fn insert_trip(&self, trip: ScheduledTrip) -> Result<(), StoreError>;

    fn load_trip(&self, trip_id: Uuid) -> Result<Option<ScheduledTrip>, StoreError>;

    fn list_trips(&self) -> Result<Vec<ScheduledTrip>, StoreError>;

    fn trips_for_driver(&self, driver_id: Uuid) -> Result<Vec<ScheduledTrip>, StoreError>;

    /// Applies every write or none of them. Returns the new trip version.
    fn commit(&self, commit: TripCommit) -> Result<u64, StoreError>;

    fn activation_check(&self, trip_id: Uuid) -> Result<Option<TripActivationCheck>, StoreError>;

    fn emergency_usage(&self, trip_id: Uuid) -> Result<Option<EmergencyUsage>, StoreError>;

    fn ledger_entries(&self, trip_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError>;
}
