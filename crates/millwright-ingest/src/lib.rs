//! Millwright batch reconciliation pipeline.
//!
//! This crate turns a batch of caller-submitted machine telemetry events
//! into at most two store round trips.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ EventSubmissions │  (one POST /events/batch body)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    Validator     │  policy checks, receivedTime stamping
//! └────────┬─────────┘
//!          │ valid events          rejections ──► summary
//!          ▼
//! ┌──────────────────┐
//! │  BatchPipeline   │  one find_by_ids, per-call reconciliation map,
//! └────────┬─────────┘  insert / dedupe / update / stale-ignore
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    EventStore    │  one unordered bulk_write, unique event_id,
//! └──────────────────┘  per-op conflict reporting
//! ```
//!
//! The reconciliation map is scoped to a single call: the pipeline shares no
//! mutable state between invocations, and stale-versus-fresh decisions are
//! made on the `received_time` stamped at validation.

pub mod error;
pub mod pipeline;
pub mod store;

pub use error::{Error, Result};
pub use pipeline::{classify, BatchPipeline, BatchSummary, Outcome, Rejection};
pub use store::{
    BulkWriteReport, EventStore, MemoryStore, SqliteStore, WriteConflict, WriteOp,
};
