use crate::error::AppError;
use crate::models::location::LocationSample;
use crate::state::AppState;

pub async fn enqueue_sample(state: &AppState, sample: LocationSample) -> Result<(), AppError> {
    state
        .sample_tx
        .send(sample)
        .await
        .map_err(|err| AppError::Internal(format!("sample queue send failed: {err}")))?;

    state.metrics.samples_in_queue.inc();
    Ok(())
}
