use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::engine::lifecycle::{self, TripTransaction};
use crate::error::EngineError;
use crate::geo::within_radius;
use crate::models::location::Coordinate;
use crate::models::trip::{ScheduledTrip, TripStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressResult {
    pub reached_point_id: Option<Uuid>,
    pub trip_completed: bool,
}

/// Decides which checkpoint, if any, `sample` reaches. Only the lowest-order
/// unreached point is considered, so a driver near a later stop never skips
/// ahead. Trips that are not ACTIVE yield an empty result.
pub fn evaluate(trip: &ScheduledTrip, sample: &Coordinate, arrival_radius_m: f64) -> ProgressResult {
    if trip.status != TripStatus::Active {
        return ProgressResult::default();
    }

    match trip.next_unreached() {
        Some(point) if within_radius(&point.coordinate, sample, arrival_radius_m) => {
            ProgressResult {
                reached_point_id: Some(point.id),
                trip_completed: point.is_final_point,
            }
        }
        _ => ProgressResult::default(),
    }
}

/// Evaluates `sample` and stages the reach (and completion) on `tx`.
pub fn advance(
    tx: &mut TripTransaction,
    sample: &Coordinate,
    arrival_radius_m: f64,
    at: DateTime<Utc>,
) -> Result<ProgressResult, EngineError> {
    let result = evaluate(tx.trip(), sample, arrival_radius_m);
    let Some(point_id) = result.reached_point_id else {
        return Ok(result);
    };

    match lifecycle::mark_point_reached(tx, point_id, at) {
        Ok(_) => Ok(result),
        Err(err @ EngineError::OutOfOrderCheckpoint { .. }) => {
            debug!(error = %err, "ignoring checkpoint that is no longer eligible");
            Ok(ProgressResult::default())
        }
        Err(err) => Err(err),
    }
}
