//! In-memory implementation of the event store.
//!
//! This implementation keeps all records in a `HashMap` behind an `RwLock`
//! and is suitable for testing and development. It enforces the same
//! `event_id` uniqueness contract as the persistent backend, and it counts
//! lookup and bulk-write calls so tests can assert that the pipeline's
//! round-trip count stays O(1) in the batch size.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use millwright_core::EventRecord;
use tokio::sync::RwLock;

use super::{BulkWriteReport, EventStore, WriteConflict, WriteOp};
use crate::error::Result;

/// In-memory event store keyed by `event_id`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: RwLock<HashMap<String, EventRecord>>,
    lookup_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_by_ids` calls made so far.
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::Relaxed)
    }

    /// Number of `bulk_write` calls made so far.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_by_ids(&self, ids: &HashSet<String>) -> Result<Vec<EventRecord>> {
        self.lookup_calls.fetch_add(1, Ordering::Relaxed);

        let events = self.events.read().await;
        Ok(ids.iter().filter_map(|id| events.get(id).cloned()).collect())
    }

    async fn bulk_write(&self, ops: Vec<WriteOp>) -> Result<BulkWriteReport> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);

        let mut events = self.events.write().await;
        let mut report = BulkWriteReport::default();

        for op in ops {
            match op {
                WriteOp::Insert(record) => {
                    if events.contains_key(&record.event_id) {
                        report.conflicts.push(WriteConflict {
                            event_id: record.event_id,
                            message: "duplicate key".to_string(),
                        });
                    } else {
                        events.insert(record.event_id.clone(), record);
                        report.inserted += 1;
                    }
                }
                WriteOp::Update(record) => {
                    if let Some(slot) = events.get_mut(&record.event_id) {
                        *slot = record;
                        report.updated += 1;
                    } else {
                        report.conflicts.push(WriteConflict {
                            event_id: record.event_id,
                            message: "no stored record to update".to_string(),
                        });
                    }
                }
            }
        }

        Ok(report)
    }

    async fn find_by_machine(
        &self,
        machine_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .filter(|e| e.machine_id == machine_id && e.event_time >= start && e.event_time < end)
            .cloned()
            .collect())
    }

    async fn find_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .filter(|e| e.event_time >= from && e.event_time < to)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.events.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, machine: &str, duration_ms: i64) -> EventRecord {
        let now = Utc::now();
        EventRecord {
            event_id: id.to_string(),
            machine_id: machine.to_string(),
            line_id: Some("L1".to_string()),
            event_time: now - Duration::seconds(60),
            received_time: now,
            duration_ms,
            defect_count: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_ids() {
        let store = MemoryStore::new();
        store
            .bulk_write(vec![WriteOp::Insert(record("E-1", "M1", 1000))])
            .await
            .unwrap();

        let ids: HashSet<String> = ["E-1".to_string(), "E-2".to_string()].into();
        let found = store.find_by_ids(&ids).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].event_id, "E-1");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_reports_conflict_without_failing_batch() {
        let store = MemoryStore::new();
        store
            .bulk_write(vec![WriteOp::Insert(record("E-1", "M1", 1000))])
            .await
            .unwrap();

        // Second batch: one losing insert, one fresh insert. The fresh one
        // must still land.
        let report = store
            .bulk_write(vec![
                WriteOp::Insert(record("E-1", "M1", 2000)),
                WriteOp::Insert(record("E-2", "M1", 3000)),
            ])
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].event_id, "E-1");
        assert_eq!(store.count().await.unwrap(), 2);

        // The losing insert did not clobber the stored record.
        let ids: HashSet<String> = ["E-1".to_string()].into();
        assert_eq!(store.find_by_ids(&ids).await.unwrap()[0].duration_ms, 1000);
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let store = MemoryStore::new();
        store
            .bulk_write(vec![WriteOp::Insert(record("E-1", "M1", 1000))])
            .await
            .unwrap();

        let report = store
            .bulk_write(vec![WriteOp::Update(record("E-1", "M1", 2000))])
            .await
            .unwrap();
        assert_eq!(report.updated, 1);

        let ids: HashSet<String> = ["E-1".to_string()].into();
        assert_eq!(store.find_by_ids(&ids).await.unwrap()[0].duration_ms, 2000);
    }

    #[tokio::test]
    async fn test_window_boundaries_inclusive_start_exclusive_end() {
        let store = MemoryStore::new();
        let t0 = "2026-01-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut rec = record("E-1", "M1", 1000);
        rec.event_time = t0;
        store.bulk_write(vec![WriteOp::Insert(rec)]).await.unwrap();

        // [10:00, 11:00) matches the exact start time.
        let hits = store
            .find_by_machine("M1", t0, t0 + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        // [09:00, 10:00) excludes the end boundary.
        let hits = store
            .find_by_machine("M1", t0 - Duration::hours(1), t0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
