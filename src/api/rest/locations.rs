use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use axum::Router;

use crate::engine::ingest::{process_batch, process_sample, BatchItemResult, LocationUpdateResponse};
use crate::engine::queue::enqueue_sample;
use crate::error::{AppError, EngineError};
use crate::models::location::LocationSample;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/locations", post(update_location))
        .route("/locations/batch", post(update_locations))
        .route("/locations/enqueue", post(enqueue_location))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<LocationSample>,
) -> Result<Json<LocationUpdateResponse>, AppError> {
    let response = tokio::task::spawn_blocking(move || process_sample(&state, &sample))
        .await
        .map_err(|err| AppError::Internal(format!("sample worker failed: {err}")))??;

    Ok(Json(response))
}

async fn update_locations(
    State(state): State<Arc<AppState>>,
    Json(samples): Json<Vec<LocationSample>>,
) -> Json<Vec<BatchItemResult>> {
    Json(process_batch(state, samples).await)
}

async fn enqueue_location(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<LocationSample>,
) -> Result<StatusCode, AppError> {
    if !sample.coordinate().is_valid() {
        return Err(EngineError::GeoInputInvalid {
            lat: sample.lat,
            lng: sample.lng,
        }
        .into());
    }

    enqueue_sample(&state, sample).await?;
    Ok(StatusCode::ACCEPTED)
}
