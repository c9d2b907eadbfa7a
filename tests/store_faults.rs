use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use trip_engine::api::rest::router;
use trip_engine::config::EngineSettings;
use trip_engine::engine::admin::{cancel_trip, create_trip};
use trip_engine::engine::emergency::{terminate, RatioForfeiture};
use trip_engine::engine::ingest::process_sample;
use trip_engine::error::EngineError;
use trip_engine::models::activation::TripActivationCheck;
use trip_engine::models::ledger::{EmergencyUsage, LedgerEntry};
use trip_engine::models::location::{Coordinate, LocationSample};
use trip_engine::models::trip::{ScheduledTrip, TripPoint, TripStatus};
use trip_engine::state::AppState;
use trip_engine::store::{MemoryStore, StoreError, TripCommit, TripStore};

const DRIVER: Uuid = Uuid::from_u128(7);

/// Memory store that can be told to reject the next commits or fail ledger reads.
#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
    conflicts_left: AtomicUsize,
    commits: AtomicUsize,
    fail_ledger: AtomicBool,
}

impl FaultyStore {
    fn conflict_next(&self, n: usize) {
        self.conflicts_left.store(n, Ordering::SeqCst);
        self.commits.store(0, Ordering::SeqCst);
    }

    fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl TripStore for FaultyStore {
    fn insert_trip(&self, trip: ScheduledTrip) -> Result<(), StoreError> {
        self.inner.insert_trip(trip)
    }

    fn load_trip(&self, trip_id: Uuid) -> Result<Option<ScheduledTrip>, StoreError> {
        self.inner.load_trip(trip_id)
    }

    fn list_trips(&self) -> Result<Vec<ScheduledTrip>, StoreError> {
        self.inner.list_trips()
    }

    fn trips_for_driver(&self, driver_id: Uuid) -> Result<Vec<ScheduledTrip>, StoreError> {
        self.inner.trips_for_driver(driver_id)
    }

    fn commit(&self, commit: TripCommit) -> Result<u64, StoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Conflict {
                trip_id: commit.trip_id,
                expected: commit.expected_version,
                found: commit.expected_version + 1,
            });
        }
        self.inner.commit(commit)
    }

    fn activation_check(&self, trip_id: Uuid) -> Result<Option<TripActivationCheck>, StoreError> {
        self.inner.activation_check(trip_id)
    }

    fn emergency_usage(&self, trip_id: Uuid) -> Result<Option<EmergencyUsage>, StoreError> {
        self.inner.emergency_usage(trip_id)
    }

    fn ledger_entries(&self, trip_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        if self.fail_ledger.load(Ordering::SeqCst) {
            return Err(StoreError::UnknownPoint {
                trip_id,
                point_id: Uuid::nil(),
            });
        }
        self.inner.ledger_entries(trip_id)
    }
}

fn setup() -> (Arc<AppState>, Arc<FaultyStore>) {
    let store = Arc::new(FaultyStore::default());
    let (state, _rx) = AppState::with_parts(
        store.clone(),
        EngineSettings::default(),
        Arc::new(RatioForfeiture { ratio: 1.0 }),
        64,
        64,
    );
    (Arc::new(state), store)
}

fn scheduled_at() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2026, 3, 14)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        .and_utc()
}

fn stops() -> [Coordinate; 2] {
    [Coordinate::new(52.52, 13.405), Coordinate::new(52.53, 13.42)]
}

fn schedule(state: &AppState) -> ScheduledTrip {
    let now = Utc::now();
    let stops = stops();
    let trip = ScheduledTrip {
        id: Uuid::new_v4(),
        name: "morning shuttle".to_string(),
        trip_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        scheduled_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        status: TripStatus::Scheduled,
        assigned_captain_id: DRIVER,
        company_id: Uuid::from_u128(8),
        price: 8_000,
        emergency_terminated_at: None,
        emergency_terminated_by: None,
        points: stops
            .iter()
            .enumerate()
            .map(|(i, coordinate)| TripPoint {
                id: Uuid::new_v4(),
                name: format!("stop {i}"),
                coordinate: *coordinate,
                order: i as u32,
                is_final_point: i == stops.len() - 1,
                reached_at: None,
            })
            .collect(),
        created_at: now,
        updated_at: now,
        version: 0,
    };
    create_trip(state, trip).unwrap()
}

fn at_start(at: DateTime<Utc>) -> LocationSample {
    LocationSample {
        driver_id: DRIVER,
        lat: stops()[0].lat,
        lng: stops()[0].lng,
        timestamp: at,
    }
}

#[test]
fn single_conflict_is_retried_and_committed() {
    let (state, store) = setup();
    let trip = schedule(&state);

    store.conflict_next(1);
    let response = process_sample(&state, &at_start(scheduled_at())).unwrap();

    assert_eq!(store.commits(), 2);
    assert!(response.activation_checks[0].can_activate);
    let stored = state.store.load_trip(trip.id).unwrap().unwrap();
    assert_eq!(stored.status, TripStatus::Active);
}

#[test]
fn repeated_conflict_fails_the_sample() {
    let (state, store) = setup();
    let trip = schedule(&state);

    store.conflict_next(2);
    let err = process_sample(&state, &at_start(scheduled_at())).unwrap_err();

    assert!(matches!(err, EngineError::PersistenceConflict(id) if id == trip.id));
    assert_eq!(store.commits(), 2);
    let stored = state.store.load_trip(trip.id).unwrap().unwrap();
    assert_eq!(stored.status, TripStatus::Scheduled);
}

#[tokio::test]
async fn repeated_conflict_maps_to_service_unavailable() {
    let (state, store) = setup();
    schedule(&state);
    store.conflict_next(2);

    let app = router(state);
    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/locations")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "driver_id": DRIVER,
                        "lat": stops()[0].lat,
                        "lng": stops()[0].lng,
                        "timestamp": scheduled_at(),
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn ledger_read_failure_is_not_reported_as_missing_entry() {
    let (state, store) = setup();
    let trip = schedule(&state);
    process_sample(&state, &at_start(scheduled_at())).unwrap();

    let first = terminate(&state, trip.id, DRIVER, "flat tyre", scheduled_at() + Duration::minutes(2))
        .unwrap();
    assert!(first.ledger_entry.is_some());

    store.fail_ledger.store(true, Ordering::SeqCst);
    let err = terminate(&state, trip.id, DRIVER, "flat tyre", scheduled_at() + Duration::minutes(3))
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}

#[test]
fn unknown_trips_leave_no_locks() {
    let (state, _store) = setup();

    for _ in 0..500 {
        let id = Uuid::new_v4();
        assert!(matches!(
            cancel_trip(&state, id, Utc::now()),
            Err(EngineError::TripNotFound(_))
        ));
        assert!(matches!(
            terminate(&state, id, DRIVER, "panic button", Utc::now()),
            Err(EngineError::TripNotFound(_))
        ));
    }

    assert_eq!(state.locks.len(), 0);
}
