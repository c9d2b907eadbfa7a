use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::activation::TripActivationCheck;
use crate::models::ledger::{EmergencyUsage, LedgerEntry};
use crate::models::trip::ScheduledTrip;
use crate::store::{StoreError, TripCommit, TripStore, TripWrite};

/// In-process store. The write guard on a trip's `trips` entry is the
/// transaction boundary for that trip: every commit validates and applies
/// while holding it, so the side tables keyed by trip id never see a
/// partial commit.
#[derive(Default)]
pub struct MemoryStore {
    trips: DashMap<Uuid, ScheduledTrip>,
    trips_by_driver: DashMap<Uuid, Vec<Uuid>>,
    activation_checks: DashMap<Uuid, TripActivationCheck>,
    emergency_usages: DashMap<Uuid, EmergencyUsage>,
    ledger: DashMap<Uuid, Vec<LedgerEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(&self, trip: &ScheduledTrip, commit: &TripCommit) -> Result<(), StoreError> {
        if trip.version != commit.expected_version {
            return Err(StoreError::Conflict {
                trip_id: trip.id,
                expected: commit.expected_version,
                found: trip.version,
            });
        }

        let mut usage_in_commit = false;
        for write in &commit.writes {
            match write {
                TripWrite::PointReached { point_id, .. } => {
                    let point = trip.point(*point_id).ok_or(StoreError::UnknownPoint {
                        trip_id: trip.id,
                        point_id: *point_id,
                    })?;
                    if point.reached_at.is_some() {
                        return Err(StoreError::Conflict {
                            trip_id: trip.id,
                            expected: commit.expected_version,
                            found: trip.version,
                        });
                    }
                }
                TripWrite::InsertEmergencyUsage(_) => {
                    if usage_in_commit || self.emergency_usages.contains_key(&trip.id) {
                        return Err(StoreError::DuplicateEmergency(trip.id));
                    }
                    usage_in_commit = true;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

impl TripStore for MemoryStore {
    fn insert_trip(&self, trip: ScheduledTrip) -> Result<(), StoreError> {
        let trip_id = trip.id;
        let driver_id = trip.assigned_captain_id;

        match self.trips.entry(trip_id) {
            Entry::Occupied(_) => return Err(StoreError::AlreadyExists(trip_id)),
            Entry::Vacant(slot) => {
                slot.insert(trip);
            }
        }

        self.trips_by_driver.entry(driver_id).or_default().push(trip_id);
        Ok(())
    }

    fn load_trip(&self, trip_id: Uuid) -> Result<Option<ScheduledTrip>, StoreError> {
        Ok(self.trips.get(&trip_id).map(|entry| entry.value().clone()))
    }

    fn list_trips(&self) -> Result<Vec<ScheduledTrip>, StoreError> {
        Ok(self
            .trips
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn trips_for_driver(&self, driver_id: Uuid) -> Result<Vec<ScheduledTrip>, StoreError> {
        let trip_ids = self
            .trips_by_driver
            .get(&driver_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        Ok(trip_ids
            .into_iter()
            .filter_map(|id| self.trips.get(&id).map(|entry| entry.value().clone()))
            .collect())
    }

    fn commit(&self, commit: TripCommit) -> Result<u64, StoreError> {
        let mut guard = self
            .trips
            .get_mut(&commit.trip_id)
            .ok_or(StoreError::NotFound(commit.trip_id))?;

        self.validate(&guard, &commit)?;

        let mut trip = guard.clone();
        for write in commit.writes {
            match write {
                TripWrite::PointReached { point_id, at } => {
                    if let Some(point) = trip.point_mut(point_id) {
                        point.reached_at = Some(at);
                    }
                    trip.updated_at = trip.updated_at.max(at);
                }
                TripWrite::Status { status, at } => {
                    trip.status = status;
                    trip.updated_at = trip.updated_at.max(at);
                }
                TripWrite::EmergencyFields { at, by } => {
                    trip.emergency_terminated_at = Some(at);
                    trip.emergency_terminated_by = Some(by);
                }
                TripWrite::UpsertActivationCheck(check) => {
                    self.activation_checks.insert(check.trip_id, check);
                }
                TripWrite::InsertEmergencyUsage(usage) => {
                    self.emergency_usages.insert(usage.trip_id, usage);
                }
                TripWrite::InsertLedgerEntry(entry) => {
                    self.ledger.entry(entry.trip_id).or_default().push(entry);
                }
            }
        }

        trip.version += 1;
        let version = trip.version;
        *guard = trip;

        Ok(version)
    }

    fn activation_check(&self, trip_id: Uuid) -> Result<Option<TripActivationCheck>, StoreError> {
        Ok(self
            .activation_checks
            .get(&trip_id)
            .map(|entry| entry.value().clone()))
    }

    fn emergency_usage(&self, trip_id: Uuid) -> Result<Option<EmergencyUsage>, StoreError> {
        Ok(self
            .emergency_usages
            .get(&trip_id)
            .map(|entry| entry.value().clone()))
    }

    fn ledger_entries(&self, trip_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .ledger
            .get(&trip_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::MemoryStore;
    use crate::models::ledger::{EmergencyUsage, LedgerEntry, LedgerKind};
    use crate::models::trip::fixtures::three_point_trip;
    use crate::models::trip::TripStatus;
    use crate::store::{StoreError, TripCommit, TripStore, TripWrite};

    fn usage(trip_id: Uuid) -> EmergencyUsage {
        EmergencyUsage {
            trip_id,
            driver_id: Uuid::from_u128(7),
            triggered_at: Utc::now(),
            reason: "flat tyre".to_string(),
        }
    }

    #[test]
    fn commit_bumps_version() {
        let store = MemoryStore::new();
        let trip = three_point_trip();
        let trip_id = trip.id;
        store.insert_trip(trip).unwrap();

        let version = store
            .commit(TripCommit {
                trip_id,
                expected_version: 0,
                writes: vec![TripWrite::Status {
                    status: TripStatus::Active,
                    at: Utc::now(),
                }],
            })
            .unwrap();

        assert_eq!(version, 1);
        let stored = store.load_trip(trip_id).unwrap().unwrap();
        assert_eq!(stored.status, TripStatus::Active);
    }

    #[test]
    fn stale_version_is_a_conflict_and_applies_nothing() {
        let store = MemoryStore::new();
        let trip = three_point_trip();
        let trip_id = trip.id;
        store.insert_trip(trip).unwrap();

        let err = store
            .commit(TripCommit {
                trip_id,
                expected_version: 3,
                writes: vec![TripWrite::Status {
                    status: TripStatus::Active,
                    at: Utc::now(),
                }],
            })
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict { .. }));
        let stored = store.load_trip(trip_id).unwrap().unwrap();
        assert_eq!(stored.status, TripStatus::Scheduled);
    }

    #[test]
    fn second_emergency_usage_rolls_back_whole_commit() {
        let store = MemoryStore::new();
        let trip = three_point_trip();
        let trip_id = trip.id;
        store.insert_trip(trip).unwrap();

        store
            .commit(TripCommit {
                trip_id,
                expected_version: 0,
                writes: vec![TripWrite::InsertEmergencyUsage(usage(trip_id))],
            })
            .unwrap();

        let err = store
            .commit(TripCommit {
                trip_id,
                expected_version: 1,
                writes: vec![
                    TripWrite::InsertLedgerEntry(LedgerEntry {
                        id: Uuid::new_v4(),
                        trip_id,
                        driver_id: Uuid::from_u128(7),
                        amount: -100,
                        kind: LedgerKind::EmergencyForfeit,
                        created_at: Utc::now(),
                    }),
                    TripWrite::InsertEmergencyUsage(usage(trip_id)),
                ],
            })
            .unwrap_err();

        assert!(matches!(err, StoreError::DuplicateEmergency(_)));
        assert!(store.ledger_entries(trip_id).unwrap().is_empty());
    }

    #[test]
    fn trips_are_indexed_by_driver() {
        let store = MemoryStore::new();
        let trip = three_point_trip();
        let driver = trip.assigned_captain_id;
        store.insert_trip(trip).unwrap();

        assert_eq!(store.trips_for_driver(driver).unwrap().len(), 1);
        assert!(store.trips_for_driver(Uuid::new_v4()).unwrap().is_empty());
    }
}
