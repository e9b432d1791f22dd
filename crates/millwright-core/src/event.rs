//! Machine telemetry event model.
//!
//! An event passes through two shapes during its life:
//!
//! - [`EventSubmission`] is what a producer sends. It carries only business
//!   fields; the reception timestamp is never trusted from the caller.
//! - [`EventRecord`] is the persisted shape. It is created by stamping a
//!   submission with the pipeline's `received_time`, which is the authority
//!   used to order conflicting updates for the same `event_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum allowed event duration: 6 hours in milliseconds.
pub const MAX_DURATION_MS: i64 = 6 * 60 * 60 * 1000;

/// Reserved `defect_count` sentinel meaning "unknown".
///
/// Events carrying this value are stored and counted in event totals, but
/// excluded from every defect sum or average.
pub const UNKNOWN_DEFECTS: i32 = -1;

/// A caller-submitted telemetry event, prior to validation.
///
/// `event_id` and `machine_id` default to empty strings when absent from the
/// payload so that validation can report `MISSING_MANDATORY_FIELDS` instead
/// of the whole batch failing to deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSubmission {
    /// Externally supplied unique identity key.
    #[serde(default)]
    pub event_id: String,

    /// Producer machine identifier.
    #[serde(default)]
    pub machine_id: String,

    /// Production line identifier. Optional, but required for line-level
    /// aggregation reads.
    #[serde(default)]
    pub line_id: Option<String>,

    /// When the physical event occurred, per the producer's clock.
    pub event_time: DateTime<Utc>,

    /// Event duration in milliseconds.
    pub duration_ms: i64,

    /// Number of defects observed, or [`UNKNOWN_DEFECTS`].
    pub defect_count: i32,
}

impl EventSubmission {
    /// Stamp this submission with the pipeline's reception timestamp,
    /// producing the persisted shape.
    pub fn into_record(self, received_time: DateTime<Utc>) -> EventRecord {
        EventRecord {
            event_id: self.event_id,
            machine_id: self.machine_id,
            line_id: self.line_id,
            event_time: self.event_time,
            received_time,
            duration_ms: self.duration_ms,
            defect_count: self.defect_count,
        }
    }
}

/// A validated, timestamped event as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_id: String,
    pub machine_id: String,
    pub line_id: Option<String>,
    pub event_time: DateTime<Utc>,
    /// Assigned by the pipeline at validation time. Freshness authority for
    /// last-writer-wins reconciliation.
    pub received_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub defect_count: i32,
}

impl EventRecord {
    /// Business-field identity: two records are "the same payload" when all
    /// fields except `received_time` (and any storage-internal identifier)
    /// are equal.
    pub fn payload_matches(&self, other: &EventRecord) -> bool {
        self.machine_id == other.machine_id
            && self.line_id == other.line_id
            && self.event_time == other.event_time
            && self.duration_ms == other.duration_ms
            && self.defect_count == other.defect_count
    }

    /// The defect count, unless it is the unknown sentinel.
    pub fn known_defects(&self) -> Option<i64> {
        if self.defect_count == UNKNOWN_DEFECTS {
            None
        } else {
            Some(i64::from(self.defect_count))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(duration_ms: i64, received_offset_secs: i64) -> EventRecord {
        let event_time = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        EventRecord {
            event_id: "E-1".to_string(),
            machine_id: "M1".to_string(),
            line_id: Some("L1".to_string()),
            event_time,
            received_time: event_time + chrono::Duration::seconds(received_offset_secs),
            duration_ms,
            defect_count: 0,
        }
    }

    #[test]
    fn test_payload_matches_ignores_received_time() {
        let a = record(1000, 0);
        let b = record(1000, 3600);
        assert!(a.payload_matches(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_payload_matches_detects_business_change() {
        let a = record(1000, 0);
        let b = record(2000, 0);
        assert!(!a.payload_matches(&b));

        let mut c = record(1000, 0);
        c.line_id = None;
        assert!(!a.payload_matches(&c));
    }

    #[test]
    fn test_known_defects_filters_sentinel() {
        let mut r = record(1000, 0);
        r.defect_count = 5;
        assert_eq!(r.known_defects(), Some(5));
        r.defect_count = UNKNOWN_DEFECTS;
        assert_eq!(r.known_defects(), None);
    }

    #[test]
    fn test_submission_deserializes_camel_case() {
        let json = r#"{
            "eventId": "E-1",
            "machineId": "M1",
            "lineId": "L1",
            "eventTime": "2026-01-15T10:00:00Z",
            "durationMs": 1000,
            "defectCount": -1
        }"#;
        let sub: EventSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(sub.event_id, "E-1");
        assert_eq!(sub.line_id.as_deref(), Some("L1"));
        assert_eq!(sub.defect_count, UNKNOWN_DEFECTS);
    }

    #[test]
    fn test_submission_defaults_missing_identifiers() {
        // Mandatory-field enforcement happens in validation, not parsing.
        let json = r#"{
            "eventTime": "2026-01-15T10:00:00Z",
            "durationMs": 1000,
            "defectCount": 0
        }"#;
        let sub: EventSubmission = serde_json::from_str(json).unwrap();
        assert!(sub.event_id.is_empty());
        assert!(sub.machine_id.is_empty());
        assert!(sub.line_id.is_none());
    }

    #[test]
    fn test_into_record_stamps_received_time() {
        let now = Utc::now();
        let sub = EventSubmission {
            event_id: "E-1".to_string(),
            machine_id: "M1".to_string(),
            line_id: None,
            event_time: now - chrono::Duration::seconds(60),
            duration_ms: 500,
            defect_count: 2,
        };
        let rec = sub.into_record(now);
        assert_eq!(rec.received_time, now);
        assert_eq!(rec.duration_ms, 500);
    }
}
