//! Core types, validation, and shared utilities for the Millwright ingestion
//! pipeline.
//!
//! This crate provides:
//! - The machine telemetry event model ([`EventSubmission`], [`EventRecord`])
//! - Per-event validation rules and rejection reasons
//! - Prometheus metrics helpers

mod event;
pub mod metrics;
mod validate;

pub use event::{EventRecord, EventSubmission, MAX_DURATION_MS, UNKNOWN_DEFECTS};
pub use validate::{validate, RejectionReason, FUTURE_SKEW_MINUTES};
