//! On-demand recovery scan endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use coordinator::ParticipantClient;
use serde::Serialize;
use store::RecordStore;

use crate::error::ApiError;
use crate::routes::lra::AppState;

#[derive(Serialize)]
pub struct ScanResponse {
    pub timed_out: usize,
    pub retried: usize,
    pub evicted: usize,
}

/// GET /lra-recovery-coordinator/recovery — runs one recovery scan
/// synchronously and reports what it did. Tests use this to force
/// recovery instead of waiting for the background tick.
#[tracing::instrument(skip(state))]
pub async fn scan<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Result<Json<ScanResponse>, ApiError> {
    let report = state.scheduler.run_recovery_scan().await?;
    Ok(Json(ScanResponse {
        timed_out: report.timed_out,
        retried: report.retried,
        evicted: report.evicted,
    }))
}
