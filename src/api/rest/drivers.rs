use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::engine::heading::DriverTrack;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/drivers/:id/heading", get(get_heading))
}

async fn get_heading(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverTrack>, AppError> {
    state
        .headings
        .track(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no location seen for driver {id}")))
}
