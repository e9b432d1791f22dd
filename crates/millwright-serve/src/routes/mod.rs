//! HTTP route handlers and router assembly.
//!
//! ## Endpoints
//!
//! - `GET /health` - service health probe (no body required)
//! - `POST /events/batch` - ingest a batch of telemetry events
//! - `GET /stats` - per-machine defect stats over a time window
//! - `GET /stats/top-defect-lines` - lines ranked by total defects

mod events;
mod health;
mod stats;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/events/batch", post(events::ingest_batch))
        .route("/stats", get(stats::machine_stats))
        .route("/stats/top-defect-lines", get(stats::top_defect_lines))
        .with_state(state)
}
