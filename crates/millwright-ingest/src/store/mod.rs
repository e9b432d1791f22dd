//! The event store port consumed by the reconciliation pipeline.
//!
//! The pipeline talks to storage through exactly three operations: a bulk
//! lookup by event ID, an unordered bulk write, and (for the read path)
//! time-window queries. The store must enforce a uniqueness constraint on
//! `event_id` and report individual operation failures without failing the
//! whole bulk call.

mod memory;
mod sqlite;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use millwright_core::EventRecord;

use crate::error::Result;

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

/// A single operation in an unordered bulk write.
///
/// An update is a full replace of the business fields plus `received_time`,
/// keyed by `event_id`.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Insert(EventRecord),
    Update(EventRecord),
}

/// A per-operation failure inside a bulk write.
///
/// Conflicts never abort the batch: the store applies every other operation
/// and reports the losers here. The canonical case is two concurrent batches
/// racing to insert the same new `event_id` - the uniqueness constraint
/// rejects exactly one of them.
#[derive(Debug, Clone)]
pub struct WriteConflict {
    /// The `event_id` of the operation that failed.
    pub event_id: String,
    /// Store-specific description of the failure.
    pub message: String,
}

/// Outcome of an unordered bulk write.
#[derive(Debug, Clone, Default)]
pub struct BulkWriteReport {
    /// Number of insert operations durably applied.
    pub inserted: usize,
    /// Number of update operations durably applied.
    pub updated: usize,
    /// Operations rejected individually by the store.
    pub conflicts: Vec<WriteConflict>,
}

/// Storage collaborator contract consumed by the pipeline and the read path.
///
/// Implementations must be safe to share across concurrent callers; all
/// exclusivity is delegated to the store's own uniqueness constraint and
/// per-document atomicity.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Fetch existing records for the given IDs in one round trip.
    ///
    /// The result is unordered and omits IDs with no match.
    async fn find_by_ids(&self, ids: &HashSet<String>) -> Result<Vec<EventRecord>>;

    /// Apply a batch of inserts and updates as a single unordered bulk write.
    ///
    /// Individual operation failures (e.g. a duplicate key from a racing
    /// insert) are reported in the returned [`BulkWriteReport`] and must not
    /// fail the call. Only a store-level failure returns `Err`.
    async fn bulk_write(&self, ops: Vec<WriteOp>) -> Result<BulkWriteReport>;

    /// Events for one machine with `event_time` in `[start, end)`.
    async fn find_by_machine(
        &self,
        machine_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>>;

    /// All events with `event_time` in `[from, to)`.
    async fn find_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>>;

    /// Total number of stored events.
    async fn count(&self) -> Result<u64>;
}
