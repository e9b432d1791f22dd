//! SQLite-backed implementation of the event store.
//!
//! The `event_id` PRIMARY KEY carries the uniqueness contract the pipeline
//! relies on: a racing insert fails with a constraint violation that is
//! reported as a per-operation conflict, never as a batch failure. Timestamps
//! are stored as Unix milliseconds.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use millwright_core::EventRecord;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection};

use super::{BulkWriteReport, EventStore, WriteConflict, WriteOp};
use crate::error::{Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    event_id      TEXT PRIMARY KEY,
    machine_id    TEXT NOT NULL,
    line_id       TEXT,
    event_time    INTEGER NOT NULL,
    received_time INTEGER NOT NULL,
    duration_ms   INTEGER NOT NULL,
    defect_count  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_machine_time
    ON events (machine_id, event_time);
";

const SELECT_COLUMNS: &str =
    "event_id, machine_id, line_id, event_time, received_time, duration_ms, defect_count";

/// Persistent event store on a single SQLite database file.
///
/// The connection is shared behind a mutex; statements are short-lived enough
/// that handlers simply lock around each call, the same way the serve layer
/// shares its read-only databases.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Opening event store at {}", path.display());

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// A row as read from SQLite, before timestamp conversion.
struct RawRow {
    event_id: String,
    machine_id: String,
    line_id: Option<String>,
    event_time_ms: i64,
    received_time_ms: i64,
    duration_ms: i64,
    defect_count: i32,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            event_id: row.get(0)?,
            machine_id: row.get(1)?,
            line_id: row.get(2)?,
            event_time_ms: row.get(3)?,
            received_time_ms: row.get(4)?,
            duration_ms: row.get(5)?,
            defect_count: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<EventRecord> {
        Ok(EventRecord {
            event_id: self.event_id,
            machine_id: self.machine_id,
            line_id: self.line_id,
            event_time: millis_to_datetime(self.event_time_ms)?,
            received_time: millis_to_datetime(self.received_time_ms)?,
            duration_ms: self.duration_ms,
            defect_count: self.defect_count,
        })
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(Error::InvalidTimestamp(ms))
}

fn collect_records(rows: Vec<RawRow>) -> Result<Vec<EventRecord>> {
    rows.into_iter().map(RawRow::into_record).collect()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn find_by_ids(&self, ids: &HashSet<String>) -> Result<Vec<EventRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {SELECT_COLUMNS} FROM events WHERE event_id IN ({placeholders})");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        collect_records(rows)
    }

    async fn bulk_write(&self, ops: Vec<WriteOp>) -> Result<BulkWriteReport> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut report = BulkWriteReport::default();

        for op in ops {
            match op {
                WriteOp::Insert(record) => {
                    let result = tx.execute(
                        "INSERT INTO events
                            (event_id, machine_id, line_id, event_time,
                             received_time, duration_ms, defect_count)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            record.event_id,
                            record.machine_id,
                            record.line_id,
                            record.event_time.timestamp_millis(),
                            record.received_time.timestamp_millis(),
                            record.duration_ms,
                            record.defect_count,
                        ],
                    );
                    match result {
                        Ok(_) => report.inserted += 1,
                        // A duplicate key only aborts this one statement, not
                        // the transaction.
                        Err(e) if is_constraint_violation(&e) => {
                            report.conflicts.push(WriteConflict {
                                event_id: record.event_id,
                                message: e.to_string(),
                            });
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                WriteOp::Update(record) => {
                    let changed = tx.execute(
                        "UPDATE events SET
                            machine_id = ?2, line_id = ?3, event_time = ?4,
                            received_time = ?5, duration_ms = ?6, defect_count = ?7
                         WHERE event_id = ?1",
                        params![
                            record.event_id,
                            record.machine_id,
                            record.line_id,
                            record.event_time.timestamp_millis(),
                            record.received_time.timestamp_millis(),
                            record.duration_ms,
                            record.defect_count,
                        ],
                    )?;
                    if changed == 0 {
                        report.conflicts.push(WriteConflict {
                            event_id: record.event_id,
                            message: "no stored record to update".to_string(),
                        });
                    } else {
                        report.updated += 1;
                    }
                }
            }
        }

        tx.commit()?;
        Ok(report)
    }

    async fn find_by_machine(
        &self,
        machine_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM events
             WHERE machine_id = ?1 AND event_time >= ?2 AND event_time < ?3"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    machine_id,
                    start.timestamp_millis(),
                    end.timestamp_millis()
                ],
                RawRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        collect_records(rows)
    }

    async fn find_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM events
             WHERE event_time >= ?1 AND event_time < ?2"
        ))?;
        let rows = stmt
            .query_map(
                params![from.timestamp_millis(), to.timestamp_millis()],
                RawRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        collect_records(rows)
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }
}
