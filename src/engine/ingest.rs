//! Per-driver entry point for location samples.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::{self, run_in_trip_tx};
use crate::engine::{activation, progress};
use crate::error::EngineError;
use crate::models::activation::ActivationCheckResult;
use crate::models::event::TripEvent;
use crate::models::location::{Coordinate, LocationSample};
use crate::models::trip::TripStatus;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct LocationUpdateResponse {
    pub driver_id: Uuid,
    pub heading: Option<f64>,
    pub activation_checks: Vec<ActivationCheckResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub driver_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<LocationUpdateResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Processes one sample: heading update, then activation or progress for
/// every non-terminal trip assigned to the driver. A failure on one trip is
/// logged and does not stop the others; only a repeated persistence
/// conflict fails the sample so the caller can redeliver it.
pub fn process_sample(
    state: &AppState,
    sample: &LocationSample,
) -> Result<LocationUpdateResponse, EngineError> {
    let start = Instant::now();
    let result = ingest(state, sample);

    let outcome = match &result {
        Ok(_) => "processed",
        Err(EngineError::GeoInputInvalid { .. }) => "rejected",
        Err(_) => "error",
    };
    state
        .metrics
        .location_samples_total
        .with_label_values(&[outcome])
        .inc();
    state
        .metrics
        .sample_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());

    result
}

fn ingest(state: &AppState, sample: &LocationSample) -> Result<LocationUpdateResponse, EngineError> {
    let position = sample.coordinate();
    if !position.is_valid() {
        warn!(
            driver_id = %sample.driver_id,
            lat = sample.lat,
            lng = sample.lng,
            "dropping sample with invalid coordinate"
        );
        return Err(EngineError::GeoInputInvalid {
            lat: sample.lat,
            lng: sample.lng,
        });
    }

    let settings = &state.settings;
    let heading = state.headings.update(
        sample.driver_id,
        position,
        sample.timestamp,
        settings.min_movement_m,
        settings.heading_smoothing,
    );
    if heading.accepted {
        let _ = state.events_tx.send(TripEvent::DriverMoved {
            driver_id: sample.driver_id,
            coordinate: position,
            heading: heading.heading,
            at: sample.timestamp,
        });
    } else {
        debug!(driver_id = %sample.driver_id, "out-of-order sample, heading unchanged");
    }

    let trips = state.store.trips_for_driver(sample.driver_id)?;
    let mut activation_checks = Vec::with_capacity(trips.len());
    let mut conflict = None;

    for trip in trips.iter().filter(|trip| !trip.status.is_terminal()) {
        match process_trip(state, trip.id, &position, sample.timestamp) {
            Ok(check) => activation_checks.push(check),
            Err(EngineError::PersistenceConflict(trip_id)) => {
                error!(trip_id = %trip_id, "trip update kept conflicting");
                conflict = Some(trip_id);
            }
            Err(err) => {
                error!(trip_id = %trip.id, error = %err, "trip update failed");
            }
        }
    }

    if let Some(trip_id) = conflict {
        return Err(EngineError::PersistenceConflict(trip_id));
    }

    Ok(LocationUpdateResponse {
        driver_id: sample.driver_id,
        heading: heading.heading,
        activation_checks,
    })
}

fn process_trip(
    state: &AppState,
    trip_id: Uuid,
    position: &Coordinate,
    at: DateTime<Utc>,
) -> Result<ActivationCheckResult, EngineError> {
    let settings = &state.settings;

    run_in_trip_tx(state, trip_id, |tx| {
        let decision = activation::evaluate(
            tx,
            position,
            at,
            settings.activation_radius_m,
            settings.activation_window,
        );

        if decision.can_activate {
            lifecycle::activate(tx, at)?;
            info!(trip_id = %trip_id, "trip activated");
        } else if tx.trip().status == TripStatus::Active {
            let result = progress::advance(tx, position, settings.arrival_radius_m, at)?;
            if let Some(point_id) = result.reached_point_id {
                info!(
                    trip_id = %trip_id,
                    point_id = %point_id,
                    completed = result.trip_completed,
                    "checkpoint reached"
                );
            }
        }

        Ok(ActivationCheckResult {
            trip_id,
            can_activate: decision.can_activate,
            reason: decision.reason,
        })
    })
}

/// Processes samples concurrently; each one succeeds or fails on its own.
pub async fn process_batch(
    state: Arc<AppState>,
    samples: Vec<LocationSample>,
) -> Vec<BatchItemResult> {
    let driver_ids: Vec<Uuid> = samples.iter().map(|s| s.driver_id).collect();

    let tasks = samples.into_iter().map(|sample| {
        let state = state.clone();
        tokio::task::spawn_blocking(move || process_sample(&state, &sample))
    });

    futures::future::join_all(tasks)
        .await
        .into_iter()
        .zip(driver_ids)
        .enumerate()
        .map(|(index, (joined, driver_id))| {
            let result = joined
                .map_err(|err| format!("sample worker failed: {err}"))
                .and_then(|r| r.map_err(|err| err.to_string()));
            match result {
                Ok(response) => BatchItemResult {
                    index,
                    driver_id,
                    response: Some(response),
                    error: None,
                },
                Err(message) => BatchItemResult {
                    index,
                    driver_id,
                    response: None,
                    error: Some(message),
                },
            }
        })
        .collect()
}

/// Drains the sample queue, running at most `workers` samples at once.
pub async fn run_ingest_engine(
    state: Arc<AppState>,
    mut sample_rx: mpsc::Receiver<LocationSample>,
    workers: usize,
) {
    info!(workers, "ingest engine started");
    let permits = Arc::new(Semaphore::new(workers.max(1)));

    while let Some(sample) = sample_rx.recv().await {
        state.metrics.samples_in_queue.dec();

        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let state = state.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            if let Err(err) = process_sample(&state, &sample) {
                warn!(driver_id = %sample.driver_id, error = %err, "queued sample failed");
            }
        });
    }

    warn!("ingest engine stopped: sample channel closed");
}
