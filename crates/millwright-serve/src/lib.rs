//! Millwright Serve - HTTP API for machine telemetry ingestion.
//!
//! This crate provides the REST surface over the batch reconciliation
//! pipeline: a batch-ingest endpoint, a small read-only stats path, and a
//! health probe.
//!
//! # Architecture
//!
//! - **AppState**: shared application state (event store, pipeline,
//!   configuration)
//! - **Routes**: endpoint handlers grouped by domain

mod error;
mod routes;
mod state;

pub use self::error::ApiError;
pub use self::routes::router;
pub use self::state::{AppState, Config};
