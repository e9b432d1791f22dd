//! Prometheus metrics helpers for the Millwright system.
//!
//! This module provides centralized metrics initialization and the common
//! metric definitions used across Millwright components.
//!
//! # Usage
//!
//! ```rust,ignore
//! use millwright_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize the Prometheus recorder
//!     let handle = init_metrics();
//!
//!     // Start the HTTP server for /metrics endpoint
//!     start_metrics_server(9091, handle).await.unwrap();
//!
//!     // Now use metrics anywhere in your code
//!     use metrics::counter;
//!     counter!("ingest_batches_total").increment(1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component name (`ingest_`, `stats_`)
//! - Suffix: unit or type (`_total`, `_seconds`)

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Returns a handle that can be used with [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if the recorder is already
/// installed, instead of panicking. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the specified port. This spawns a
/// background task and returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server failed: {}", e);
        }
    });

    Ok(())
}

/// Register descriptions for the metrics used across Millwright.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    describe_counter!(
        "ingest_batches_total",
        "Total number of batches processed by the reconciliation pipeline"
    );
    describe_counter!(
        "ingest_events_accepted_total",
        "Number of events classified as inserts"
    );
    describe_counter!(
        "ingest_events_deduped_total",
        "Number of events skipped as payload-identical duplicates"
    );
    describe_counter!(
        "ingest_events_updated_total",
        "Number of events applied as updates to an existing record"
    );
    describe_counter!(
        "ingest_events_stale_dropped_total",
        "Number of conflicting updates dropped for being older than the stored record"
    );
    describe_counter!(
        "ingest_events_rejected_total",
        "Number of events rejected during validation"
    );
    describe_counter!(
        "ingest_write_conflicts_total",
        "Number of per-operation conflicts reported by the store during bulk writes"
    );
    describe_histogram!(
        "ingest_batch_seconds",
        "Wall-clock duration of a full batch reconciliation, in seconds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_init_metrics_second_install_returns_none() {
        // The recorder is process-global: only the first install can
        // succeed, and repeat attempts must fail quietly instead of
        // panicking like init_metrics does.
        let _ = try_init_metrics();
        assert!(try_init_metrics().is_none());
    }
}
