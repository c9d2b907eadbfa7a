use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::trip::TripStatus;
use crate::store::StoreError;

/// Failures of the trip engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("trip {trip_id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        trip_id: Uuid,
        from: TripStatus,
        to: TripStatus,
    },

    #[error("trip {trip_id}: point {point_id} is not the next checkpoint")]
    OutOfOrderCheckpoint { trip_id: Uuid, point_id: Uuid },

    #[error("trip {0}: emergency already recorded")]
    DuplicateEmergency(Uuid),

    #[error("invalid coordinate ({lat}, {lng})")]
    GeoInputInvalid { lat: f64, lng: f64 },

    #[error("trip {0}: concurrent modification, retry later")]
    PersistenceConflict(Uuid),

    #[error("trip {0} not found")]
    TripNotFound(Uuid),

    #[error("invalid trip: {0}")]
    InvalidTrip(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => EngineError::TripNotFound(id),
            StoreError::Conflict { trip_id, .. } => EngineError::PersistenceConflict(trip_id),
            StoreError::DuplicateEmergency(id) => EngineError::DuplicateEmergency(id),
            StoreError::AlreadyExists(id) => {
                EngineError::InvalidTrip(format!("trip {id} already exists"))
            }
            other @ StoreError::UnknownPoint { .. } => EngineError::Store(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::TripNotFound(_) => AppError::NotFound(message),
            EngineError::GeoInputInvalid { .. } | EngineError::InvalidTrip(_) => {
                AppError::BadRequest(message)
            }
            EngineError::InvalidTransition { .. }
            | EngineError::OutOfOrderCheckpoint { .. }
            | EngineError::DuplicateEmergency(_) => AppError::Conflict(message),
            EngineError::PersistenceConflict(_) => AppError::Unavailable(message),
            EngineError::Store(_) => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
