use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::lifecycle::{self, run_in_trip_tx};
use crate::error::EngineError;
use crate::models::trip::{ScheduledTrip, TripStatus};
use crate::state::AppState;

pub fn create_trip(state: &AppState, mut trip: ScheduledTrip) -> Result<ScheduledTrip, EngineError> {
    trip.validate().map_err(EngineError::InvalidTrip)?;
    trip.status = TripStatus::Scheduled;
    trip.version = 0;
    trip.emergency_terminated_at = None;
    trip.emergency_terminated_by = None;
    trip.points.sort_by_key(|p| p.order);

    state.store.insert_trip(trip.clone())?;
    info!(
        trip_id = %trip.id,
        captain_id = %trip.assigned_captain_id,
        points = trip.points.len(),
        scheduled_at = %trip.scheduled_at(),
        "trip scheduled"
    );
    Ok(trip)
}

pub fn cancel_trip(
    state: &AppState,
    trip_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ScheduledTrip, EngineError> {
    run_in_trip_tx(state, trip_id, |tx| lifecycle::cancel(tx, now))?;
    info!(trip_id = %trip_id, "trip cancelled");
    reload(state, trip_id)
}

pub fn fail_trip(
    state: &AppState,
    trip_id: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<ScheduledTrip, EngineError> {
    run_in_trip_tx(state, trip_id, |tx| lifecycle::fail(tx, now))?;
    info!(trip_id = %trip_id, reason, "trip marked failed");
    reload(state, trip_id)
}

fn reload(state: &AppState, trip_id: Uuid) -> Result<ScheduledTrip, EngineError> {
    state
        .store
        .load_trip(trip_id)?
        .ok_or(EngineError::TripNotFound(trip_id))
}
