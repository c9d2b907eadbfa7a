use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::{self, run_in_trip_tx};
use crate::error::EngineError;
use crate::models::ledger::{EmergencyUsage, LedgerEntry, LedgerKind};
use crate::models::trip::ScheduledTrip;
use crate::state::AppState;
use crate::store::TripWrite;

/// Business rule for the money side of an emergency stop.
pub trait ForfeiturePolicy: Send + Sync {
    /// Signed amount (minor units) and kind of the single ledger entry.
    fn amount_for(&self, trip: &ScheduledTrip, reason: &str) -> (i64, LedgerKind);
}

/// Debits `ratio` of the trip price from the driver.
#[derive(Debug, Clone, Copy)]
pub struct RatioForfeiture {
    pub ratio: f64,
}

impl ForfeiturePolicy for RatioForfeiture {
    fn amount_for(&self, trip: &ScheduledTrip, _reason: &str) -> (i64, LedgerKind) {
        let ratio = self.ratio.clamp(0.0, 1.0);
        let amount = -((trip.price as f64) * ratio).round() as i64;
        let kind = if ratio < 1.0 {
            LedgerKind::EmergencyPartialPayout
        } else {
            LedgerKind::EmergencyForfeit
        };
        (amount, kind)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TerminationResult {
    pub trip_id: Uuid,
    pub usage: EmergencyUsage,
    pub ledger_entry: Option<LedgerEntry>,
    /// True when an earlier signal had already terminated the trip.
    pub already_recorded: bool,
}

/// Emergency-terminates an ACTIVE trip: one usage row, the status change and
/// one ledger entry, committed together. Repeated signals for the same trip
/// return the first result without writing anything.
pub fn terminate(
    state: &AppState,
    trip_id: Uuid,
    driver_id: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<TerminationResult, EngineError> {
    let outcome = run_in_trip_tx(state, trip_id, |tx| {
        if let Some(usage) = state.store.emergency_usage(trip_id)? {
            return existing(state, usage);
        }

        lifecycle::record_emergency(tx, driver_id, reason, now)?;

        let usage = EmergencyUsage {
            trip_id,
            driver_id,
            triggered_at: now,
            reason: reason.to_string(),
        };
        let (amount, kind) = state.forfeiture.amount_for(tx.trip(), reason);
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            trip_id,
            driver_id,
            amount,
            kind,
            created_at: now,
        };

        tx.stage(TripWrite::InsertEmergencyUsage(usage.clone()));
        tx.stage(TripWrite::InsertLedgerEntry(entry.clone()));

        Ok(TerminationResult {
            trip_id,
            usage,
            ledger_entry: Some(entry),
            already_recorded: false,
        })
    });

    match outcome {
        Ok(result) if !result.already_recorded => {
            state
                .metrics
                .emergency_terminations_total
                .with_label_values(&["terminated"])
                .inc();
            info!(
                trip_id = %trip_id,
                driver_id = %driver_id,
                amount = ?result.ledger_entry.as_ref().map(|e| e.amount),
                "trip emergency-terminated"
            );
            Ok(result)
        }
        Ok(result) => {
            duplicate(state, trip_id);
            Ok(result)
        }
        // The store's uniqueness constraint is the last line: a usage row that
        // appeared between our check and commit means another signal won.
        Err(EngineError::DuplicateEmergency(_)) => {
            duplicate(state, trip_id);
            let usage = state
                .store
                .emergency_usage(trip_id)?
                .ok_or(EngineError::DuplicateEmergency(trip_id))?;
            existing(state, usage)
        }
        Err(err) => {
            state
                .metrics
                .emergency_terminations_total
                .with_label_values(&["rejected"])
                .inc();
            warn!(trip_id = %trip_id, error = %err, "emergency termination rejected");
            Err(err)
        }
    }
}

fn existing(state: &AppState, usage: EmergencyUsage) -> Result<TerminationResult, EngineError> {
    let ledger_entry = state
        .store
        .ledger_entries(usage.trip_id)?
        .into_iter()
        .find(|e| {
            matches!(
                e.kind,
                LedgerKind::EmergencyForfeit | LedgerKind::EmergencyPartialPayout
            )
        });

    Ok(TerminationResult {
        trip_id: usage.trip_id,
        usage,
        ledger_entry,
        already_recorded: true,
    })
}

fn duplicate(state: &AppState, trip_id: Uuid) {
    state
        .metrics
        .emergency_terminations_total
        .with_label_values(&["duplicate"])
        .inc();
    info!(trip_id = %trip_id, "duplicate emergency signal ignored");
}
