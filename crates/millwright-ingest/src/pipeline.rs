//! Batch reconciliation pipeline.
//!
//! One `process_batch` call runs two phases:
//!
//! 1. **Validation** - each submission is checked against the ingestion
//!    policy; failures are collected as rejections and never reach storage.
//!    The reception timestamp is snapshotted once for the whole batch and
//!    stamped onto every surviving event.
//! 2. **Reconciliation** - one bulk lookup fetches the stored records for
//!    every surviving `event_id`, each event is classified against a
//!    call-local map of "what the store will hold", and the resulting
//!    inserts and updates go out as one unordered bulk write.
//!
//! The call-local map is updated immediately after every insert and update
//! classification, so a later duplicate in the same batch resolves against
//! the effect of the earlier one rather than against a stale storage read.
//! Round trips to the store are O(1) in the batch size: at most one lookup
//! and one bulk write per call.
//!
//! The pipeline holds no mutable state of its own, so it is safe to invoke
//! concurrently; cross-batch exclusivity is delegated entirely to the
//! store's uniqueness constraint on `event_id`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use millwright_core::{validate, EventRecord, EventSubmission, RejectionReason};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::{EventStore, WriteOp};

/// How the reconciler resolved one valid event against the stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No stored record for this `event_id`: insert a new one.
    Insert,
    /// Payload-identical to the stored record: nothing to write.
    Dedupe,
    /// Payload differs and is at least as fresh as the stored record:
    /// replace it.
    Update,
    /// Payload differs but the stored record is strictly fresher: drop the
    /// event.
    StaleIgnore,
}

/// Classify one incoming event against the record currently mapped to its
/// `event_id`, if any.
///
/// Freshness is judged on `received_time` alone: an update loses only when
/// the stored record is *strictly* newer, so an equal timestamp (e.g. two
/// entries stamped by the same batch) resolves as an update.
pub fn classify(existing: Option<&EventRecord>, incoming: &EventRecord) -> Outcome {
    match existing {
        None => Outcome::Insert,
        Some(stored) if stored.payload_matches(incoming) => Outcome::Dedupe,
        Some(stored) if stored.received_time > incoming.received_time => Outcome::StaleIgnore,
        Some(_) => Outcome::Update,
    }
}

/// One rejected event in a batch summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// The submitted `event_id`; empty when the submission carried none.
    pub event_id: String,
    pub reason: RejectionReason,
}

/// Result of one `process_batch` call.
///
/// `stale_dropped` counts conflicting updates discarded for being older than
/// the stored record; those events appear in no other counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub accepted: usize,
    pub deduped: usize,
    pub updated: usize,
    pub stale_dropped: usize,
    pub rejected: usize,
    pub rejections: Vec<Rejection>,
}

/// Stateless batch reconciliation pipeline over an [`EventStore`].
pub struct BatchPipeline {
    store: Arc<dyn EventStore>,
}

impl BatchPipeline {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Process one batch of submissions: validate, reconcile, bulk-write.
    ///
    /// Validation failures are reported in the summary and never abort the
    /// call. A store failure on the lookup or the bulk write propagates and
    /// fails the whole call; no retry is attempted here.
    pub async fn process_batch(&self, batch: Vec<EventSubmission>) -> Result<BatchSummary> {
        let started = Instant::now();
        let now = Utc::now();

        // Phase A: validation. `now` is the reception stamp for every
        // surviving event in this batch.
        let mut valid = Vec::with_capacity(batch.len());
        let mut rejections = Vec::new();
        for submission in batch {
            match validate(&submission, now) {
                Ok(()) => valid.push(submission.into_record(now)),
                Err(reason) => rejections.push(Rejection {
                    event_id: submission.event_id,
                    reason,
                }),
            }
        }

        if valid.is_empty() {
            counter!("ingest_batches_total").increment(1);
            counter!("ingest_events_rejected_total").increment(rejections.len() as u64);
            return Ok(BatchSummary {
                rejected: rejections.len(),
                rejections,
                ..Default::default()
            });
        }

        // Phase B: one lookup for every distinct id in the batch.
        let ids: HashSet<String> = valid.iter().map(|e| e.event_id.clone()).collect();
        let mut existing: HashMap<String, EventRecord> = self
            .store
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|record| (record.event_id.clone(), record))
            .collect();

        // Phase C: classify in submission order, folding each accepted event
        // back into the map so intra-batch duplicates see it.
        let mut ops = Vec::new();
        let mut summary = BatchSummary::default();

        for event in valid {
            match classify(existing.get(&event.event_id), &event) {
                Outcome::Insert => {
                    summary.accepted += 1;
                    ops.push(WriteOp::Insert(event.clone()));
                    existing.insert(event.event_id.clone(), event);
                }
                Outcome::Dedupe => {
                    summary.deduped += 1;
                }
                Outcome::StaleIgnore => {
                    summary.stale_dropped += 1;
                }
                Outcome::Update => {
                    summary.updated += 1;
                    ops.push(WriteOp::Update(event.clone()));
                    existing.insert(event.event_id.clone(), event);
                }
            }
        }

        // Phase D: one unordered bulk write. Per-op conflicts (a racing
        // batch won an insert) are logged and counted, not reconciled: the
        // summary reflects classification, not durable application.
        if !ops.is_empty() {
            let report = self.store.bulk_write(ops).await?;
            for conflict in &report.conflicts {
                tracing::warn!(
                    event_id = %conflict.event_id,
                    "bulk write conflict: {}",
                    conflict.message
                );
            }
            counter!("ingest_write_conflicts_total").increment(report.conflicts.len() as u64);
        }

        summary.rejected = rejections.len();
        summary.rejections = rejections;

        counter!("ingest_batches_total").increment(1);
        counter!("ingest_events_accepted_total").increment(summary.accepted as u64);
        counter!("ingest_events_deduped_total").increment(summary.deduped as u64);
        counter!("ingest_events_updated_total").increment(summary.updated as u64);
        counter!("ingest_events_stale_dropped_total").increment(summary.stale_dropped as u64);
        counter!("ingest_events_rejected_total").increment(summary.rejected as u64);
        histogram!("ingest_batch_seconds").record(started.elapsed().as_secs_f64());

        tracing::debug!(
            accepted = summary.accepted,
            deduped = summary.deduped,
            updated = summary.updated,
            stale_dropped = summary.stale_dropped,
            rejected = summary.rejected,
            "batch reconciled"
        );

        Ok(summary)
    }
}
