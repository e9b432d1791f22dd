//! Batch ingestion endpoint.

use axum::extract::State;
use axum::Json;
use millwright_core::EventSubmission;
use millwright_ingest::BatchSummary;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /events/batch`
///
/// Submit a batch of telemetry events for reconciliation. Per-event
/// validation failures are reported in the summary; only a store failure
/// fails the request.
pub async fn ingest_batch(
    State(state): State<AppState>,
    Json(events): Json<Vec<EventSubmission>>,
) -> Result<Json<BatchSummary>, ApiError> {
    let summary = state.pipeline.process_batch(events).await?;
    Ok(Json(summary))
}
