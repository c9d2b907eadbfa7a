use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::admin;
use crate::engine::emergency::{self, TerminationResult};
use crate::error::{AppError, EngineError};
use crate::models::activation::TripActivationCheck;
use crate::models::ledger::{EmergencyUsage, LedgerEntry};
use crate::models::location::Coordinate;
use crate::models::trip::{ScheduledTrip, TripPoint, TripStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips", post(create_trip).get(list_trips))
        .route("/trips/:id", get(get_trip))
        .route("/trips/:id/activation-check", get(get_activation_check))
        .route("/trips/:id/ledger", get(get_ledger))
        .route("/trips/:id/emergency", get(get_emergency).post(trigger_emergency))
        .route("/trips/:id/cancel", post(cancel_trip))
        .route("/trips/:id/fail", post(fail_trip))
}

#[derive(Deserialize)]
pub struct CreatePointRequest {
    pub name: String,
    pub coordinate: Coordinate,
    pub order: u32,
    #[serde(default)]
    pub is_final_point: bool,
}

#[derive(Deserialize)]
pub struct CreateTripRequest {
    pub name: String,
    pub trip_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub assigned_captain_id: Uuid,
    pub company_id: Uuid,
    pub price: i64,
    pub points: Vec<CreatePointRequest>,
}

#[derive(Deserialize)]
pub struct EmergencyRequest {
    pub driver_id: Uuid,
    pub reason: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct FailRequest {
    pub reason: String,
}

async fn create_trip(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTripRequest>,
) -> Result<Json<ScheduledTrip>, AppError> {
    let now = Utc::now();
    let trip = ScheduledTrip {
        id: Uuid::new_v4(),
        name: payload.name,
        trip_date: payload.trip_date,
        scheduled_time: payload.scheduled_time,
        status: TripStatus::Scheduled,
        assigned_captain_id: payload.assigned_captain_id,
        company_id: payload.company_id,
        price: payload.price,
        emergency_terminated_at: None,
        emergency_terminated_by: None,
        points: payload
            .points
            .into_iter()
            .map(|p| TripPoint {
                id: Uuid::new_v4(),
                name: p.name,
                coordinate: p.coordinate,
                order: p.order,
                is_final_point: p.is_final_point,
                reached_at: None,
            })
            .collect(),
        created_at: now,
        updated_at: now,
        version: 0,
    };

    Ok(Json(admin::create_trip(&state, trip)?))
}

async fn list_trips(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ScheduledTrip>>, AppError> {
    let trips = state.store.list_trips().map_err(EngineError::from)?;
    Ok(Json(trips))
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledTrip>, AppError> {
    let trip = state
        .store
        .load_trip(id)
        .map_err(EngineError::from)?
        .ok_or_else(|| AppError::NotFound(format!("trip {} not found", id)))?;

    Ok(Json(trip))
}

async fn get_activation_check(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TripActivationCheck>, AppError> {
    let check = state
        .store
        .activation_check(id)
        .map_err(EngineError::from)?
        .ok_or_else(|| AppError::NotFound(format!("trip {} has not been evaluated", id)))?;

    Ok(Json(check))
}

async fn get_ledger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    let entries = state.store.ledger_entries(id).map_err(EngineError::from)?;
    Ok(Json(entries))
}

async fn get_emergency(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<EmergencyUsage>, AppError> {
    let usage = state
        .store
        .emergency_usage(id)
        .map_err(EngineError::from)?
        .ok_or_else(|| AppError::NotFound(format!("no emergency recorded for trip {}", id)))?;

    Ok(Json(usage))
}

async fn trigger_emergency(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EmergencyRequest>,
) -> Result<Json<TerminationResult>, AppError> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::BadRequest("reason cannot be empty".to_string()));
    }

    let now = payload.timestamp.unwrap_or_else(Utc::now);
    let result = blocking(move || {
        emergency::terminate(&state, id, payload.driver_id, &payload.reason, now)
    })
    .await?;
    Ok(Json(result))
}

async fn cancel_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledTrip>, AppError> {
    let trip = blocking(move || admin::cancel_trip(&state, id, Utc::now())).await?;
    Ok(Json(trip))
}

async fn fail_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FailRequest>,
) -> Result<Json<ScheduledTrip>, AppError> {
    let trip = blocking(move || admin::fail_trip(&state, id, &payload.reason, Utc::now())).await?;
    Ok(Json(trip))
}

/// Runs a trip mutation off the async runtime; it may wait on the trip's lock.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| AppError::Internal(format!("trip worker failed: {err}")))?
        .map_err(AppError::from)
}
