//! Trip status state machine.
//!
//! ```text
//! SCHEDULED -> ACTIVE | CANCELLED
//! ACTIVE    -> COMPLETED | EMERGENCY_TERMINATED | FAILED
//! ```
//!
//! All mutations of status, checkpoint progress and emergency fields are
//! staged on a [`TripTransaction`] through the functions in this module and
//! committed by [`run_in_trip_tx`] while the trip's lock is held.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::event::TripEvent;
use crate::models::trip::{ScheduledTrip, TripStatus};
use crate::state::AppState;
use crate::store::{TripCommit, TripWrite};

/// Working copy of one trip plus the writes and events staged against it.
#[derive(Debug)]
pub struct TripTransaction {
    trip: ScheduledTrip,
    base_version: u64,
    writes: Vec<TripWrite>,
    events: Vec<TripEvent>,
}

impl TripTransaction {
    pub fn begin(trip: ScheduledTrip) -> Self {
        Self {
            base_version: trip.version,
            trip,
            writes: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn trip(&self) -> &ScheduledTrip {
        &self.trip
    }

    pub fn stage(&mut self, write: TripWrite) {
        self.writes.push(write);
    }

    pub fn events(&self) -> &[TripEvent] {
        &self.events
    }

    fn emit(&mut self, event: TripEvent) {
        self.events.push(event);
    }

    pub fn into_parts(self) -> (ScheduledTrip, TripCommit, Vec<TripEvent>) {
        let commit = TripCommit {
            trip_id: self.trip.id,
            expected_version: self.base_version,
            writes: self.writes,
        };
        (self.trip, commit, self.events)
    }
}

pub fn transition(
    tx: &mut TripTransaction,
    to: TripStatus,
    at: DateTime<Utc>,
) -> Result<(), EngineError> {
    let from = tx.trip.status;
    if !from.can_transition_to(to) {
        return Err(EngineError::InvalidTransition {
            trip_id: tx.trip.id,
            from,
            to,
        });
    }

    if to == TripStatus::Completed {
        let final_reached = tx
            .trip
            .points
            .iter()
            .any(|p| p.is_final_point && p.reached_at.is_some());
        if !final_reached {
            return Err(EngineError::InvalidTransition {
                trip_id: tx.trip.id,
                from,
                to,
            });
        }
    }

    tx.trip.status = to;
    tx.trip.updated_at = tx.trip.updated_at.max(at);
    tx.stage(TripWrite::Status { status: to, at });
    tx.emit(TripEvent::StatusChanged {
        trip_id: tx.trip.id,
        from,
        to,
        at,
    });

    debug!(trip_id = %tx.trip.id, %from, %to, "trip transition staged");
    Ok(())
}

/// SCHEDULED -> ACTIVE. The start checkpoint counts as reached at activation.
pub fn activate(tx: &mut TripTransaction, at: DateTime<Utc>) -> Result<(), EngineError> {
    transition(tx, TripStatus::Active, at)?;

    let (start_id, unreached) = tx
        .trip
        .start_point()
        .map(|p| (p.id, p.reached_at.is_none()))
        .ok_or_else(|| EngineError::InvalidTrip(format!("trip {} has no points", tx.trip.id)))?;

    if unreached {
        mark_point_reached(tx, start_id, at)?;
    }
    Ok(())
}

/// Records `point_id` as reached. Only the lowest-order unreached point is
/// accepted. Reaching the final point completes the trip.
///
/// Returns the timestamp actually written, which is never earlier than the
/// previous checkpoint's.
pub fn mark_point_reached(
    tx: &mut TripTransaction,
    point_id: Uuid,
    at: DateTime<Utc>,
) -> Result<DateTime<Utc>, EngineError> {
    let trip_id = tx.trip.id;
    if tx.trip.status != TripStatus::Active {
        return Err(EngineError::InvalidTransition {
            trip_id,
            from: tx.trip.status,
            to: TripStatus::Active,
        });
    }

    let eligible = tx.trip.next_unreached().map(|p| p.id);
    if eligible != Some(point_id) {
        return Err(EngineError::OutOfOrderCheckpoint { trip_id, point_id });
    }

    let previous = tx
        .trip
        .point(point_id)
        .and_then(|p| tx.trip.last_reached_before(p.order));
    let reached_at = previous.map_or(at, |prev| prev.max(at));

    let (order, is_final) = match tx.trip.point_mut(point_id) {
        Some(point) => {
            point.reached_at = Some(reached_at);
            (point.order, point.is_final_point)
        }
        None => return Err(EngineError::OutOfOrderCheckpoint { trip_id, point_id }),
    };

    tx.stage(TripWrite::PointReached {
        point_id,
        at: reached_at,
    });
    tx.emit(TripEvent::CheckpointReached {
        trip_id,
        point_id,
        order,
        at: reached_at,
    });

    if is_final {
        transition(tx, TripStatus::Completed, reached_at)?;
    }

    Ok(reached_at)
}

/// ACTIVE -> EMERGENCY_TERMINATED with the emergency fields filled in.
pub fn record_emergency(
    tx: &mut TripTransaction,
    driver_id: Uuid,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<(), EngineError> {
    transition(tx, TripStatus::EmergencyTerminated, at)?;

    tx.trip.emergency_terminated_at = Some(at);
    tx.trip.emergency_terminated_by = Some(driver_id);
    tx.stage(TripWrite::EmergencyFields { at, by: driver_id });
    tx.emit(TripEvent::EmergencyTerminated {
        trip_id: tx.trip.id,
        driver_id,
        reason: reason.to_string(),
        at,
    });
    Ok(())
}

pub fn cancel(tx: &mut TripTransaction, at: DateTime<Utc>) -> Result<(), EngineError> {
    transition(tx, TripStatus::Cancelled, at)
}

pub fn fail(tx: &mut TripTransaction, at: DateTime<Utc>) -> Result<(), EngineError> {
    transition(tx, TripStatus::Failed, at)
}

/// Runs `f` against a fresh copy of the trip under the trip's lock and
/// commits what it staged. A version conflict is retried once with a fresh
/// load; a second conflict surfaces as [`EngineError::PersistenceConflict`].
/// Events are published only after a successful commit.
pub fn run_in_trip_tx<T>(
    state: &AppState,
    trip_id: Uuid,
    mut f: impl FnMut(&mut TripTransaction) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let outcome = state.locks.with_lock(
        trip_id,
        || -> Result<(T, TripStatus, Vec<TripEvent>), EngineError> {
            let mut attempt = 0;
            loop {
                attempt += 1;
                let trip = state
                    .store
                    .load_trip(trip_id)?
                    .ok_or(EngineError::TripNotFound(trip_id))?;

                let mut tx = TripTransaction::begin(trip);
                let value = f(&mut tx)?;
                let (trip, commit, events) = tx.into_parts();

                if commit.is_empty() {
                    return Ok((value, trip.status, events));
                }

                match state.store.commit(commit) {
                    Ok(_) => return Ok((value, trip.status, events)),
                    Err(err) => match EngineError::from(err) {
                        EngineError::PersistenceConflict(_) if attempt < 2 => {
                            warn!(trip_id = %trip_id, "commit conflict, retrying once");
                        }
                        other => return Err(other),
                    },
                }
            }
        },
    );

    match outcome {
        Ok((value, status, events)) => {
            publish(state, events);
            if status.is_terminal() {
                state.locks.forget_if_idle(trip_id);
            }
            Ok(value)
        }
        Err(err) => {
            state.locks.forget_if_idle(trip_id);
            Err(err)
        }
    }
}

fn publish(state: &AppState, events: Vec<TripEvent>) {
    for event in events {
        match &event {
            TripEvent::StatusChanged { to, .. } => state
                .metrics
                .trip_transitions_total
                .with_label_values(&[to.as_str()])
                .inc(),
            TripEvent::CheckpointReached { .. } => state.metrics.checkpoints_reached_total.inc(),
            _ => {}
        }
        let _ = state.events_tx.send(event);
    }
}
