use chrono::{DateTime, Utc};

use crate::config::ActivationWindow;
use crate::engine::lifecycle::TripTransaction;
use crate::geo::within_radius;
use crate::models::activation::{ActivationDecision, ActivationReason, TripActivationCheck};
use crate::models::location::Coordinate;
use crate::models::trip::{ScheduledTrip, TripStatus};
use crate::store::TripWrite;

/// Whether `trip` may move from SCHEDULED to ACTIVE given a sample taken at
/// `now`. Rules run in order and the first failing one names the reason.
pub fn decide(
    trip: &ScheduledTrip,
    sample: &Coordinate,
    now: DateTime<Utc>,
    activation_radius_m: f64,
    window: ActivationWindow,
) -> ActivationDecision {
    if trip.status != TripStatus::Scheduled {
        return refuse(ActivationReason::NotEligible);
    }

    let scheduled = trip.scheduled_at();
    if now < scheduled - window.before || now > scheduled + window.after {
        return refuse(ActivationReason::OutsideWindow);
    }

    match trip.start_point() {
        Some(start) if within_radius(&start.coordinate, sample, activation_radius_m) => {
            ActivationDecision {
                can_activate: true,
                reason: ActivationReason::Ready,
            }
        }
        _ => refuse(ActivationReason::TooFarFromStart),
    }
}

fn refuse(reason: ActivationReason) -> ActivationDecision {
    ActivationDecision {
        can_activate: false,
        reason,
    }
}

/// Decides and stages the overwrite of the trip's cached activation check.
pub fn evaluate(
    tx: &mut TripTransaction,
    sample: &Coordinate,
    now: DateTime<Utc>,
    activation_radius_m: f64,
    window: ActivationWindow,
) -> ActivationDecision {
    let decision = decide(tx.trip(), sample, now, activation_radius_m, window);
    tx.stage(TripWrite::UpsertActivationCheck(TripActivationCheck {
        trip_id: tx.trip().id,
        can_activate: decision.can_activate,
        evaluated_at: now,
        reason: decision.reason,
    }));
    decision
}
