//! Per-event validation rules.
//!
//! Validation is a pure function applied once per incoming event, before the
//! event touches storage. Checks run in a fixed order and the first failure
//! wins; an event is never reported with more than one reason.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{EventSubmission, MAX_DURATION_MS};

/// How far in the future a producer-supplied `event_time` may lie before the
/// event is rejected, in minutes.
pub const FUTURE_SKEW_MINUTES: i64 = 15;

/// Why an event was rejected during validation.
///
/// Serializes to the wire reason codes (`INVALID_DURATION`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    /// `duration_ms` is negative or exceeds six hours.
    #[error("INVALID_DURATION")]
    InvalidDuration,

    /// `event_time` is more than fifteen minutes in the future.
    #[error("FUTURE_EVENT_TIME")]
    FutureEventTime,

    /// `event_id` or `machine_id` is missing.
    #[error("MISSING_MANDATORY_FIELDS")]
    MissingMandatoryFields,
}

impl RejectionReason {
    /// The wire reason code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidDuration => "INVALID_DURATION",
            Self::FutureEventTime => "FUTURE_EVENT_TIME",
            Self::MissingMandatoryFields => "MISSING_MANDATORY_FIELDS",
        }
    }
}

/// Validate a submission against the ingestion policy.
///
/// `now` is the batch-wide reception snapshot: it is taken once per batch and
/// shared by every event in it, both for the future-skew check here and for
/// the `received_time` stamp applied to passing events.
pub fn validate(event: &EventSubmission, now: DateTime<Utc>) -> Result<(), RejectionReason> {
    if event.duration_ms < 0 || event.duration_ms > MAX_DURATION_MS {
        return Err(RejectionReason::InvalidDuration);
    }

    if event.event_time > now + Duration::minutes(FUTURE_SKEW_MINUTES) {
        return Err(RejectionReason::FutureEventTime);
    }

    if event.event_id.is_empty() || event.machine_id.is_empty() {
        return Err(RejectionReason::MissingMandatoryFields);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(duration_ms: i64) -> EventSubmission {
        EventSubmission {
            event_id: "E-1".to_string(),
            machine_id: "M1".to_string(),
            line_id: Some("L1".to_string()),
            event_time: Utc::now() - Duration::seconds(60),
            duration_ms,
            defect_count: 0,
        }
    }

    #[test]
    fn test_accepts_in_policy_event() {
        assert_eq!(validate(&submission(1000), Utc::now()), Ok(()));
    }

    #[test]
    fn test_rejects_negative_duration() {
        assert_eq!(
            validate(&submission(-100), Utc::now()),
            Err(RejectionReason::InvalidDuration)
        );
    }

    #[test]
    fn test_rejects_duration_over_six_hours() {
        assert_eq!(validate(&submission(MAX_DURATION_MS), Utc::now()), Ok(()));
        assert_eq!(
            validate(&submission(MAX_DURATION_MS + 1), Utc::now()),
            Err(RejectionReason::InvalidDuration)
        );
    }

    #[test]
    fn test_rejects_far_future_event_time() {
        let now = Utc::now();
        let mut sub = submission(1000);
        sub.event_time = now + Duration::minutes(20);
        assert_eq!(validate(&sub, now), Err(RejectionReason::FutureEventTime));

        // Inside the skew allowance is fine.
        sub.event_time = now + Duration::minutes(14);
        assert_eq!(validate(&sub, now), Ok(()));
    }

    #[test]
    fn test_rejects_missing_identifiers() {
        let mut sub = submission(1000);
        sub.event_id = String::new();
        assert_eq!(
            validate(&sub, Utc::now()),
            Err(RejectionReason::MissingMandatoryFields)
        );

        let mut sub = submission(1000);
        sub.machine_id = String::new();
        assert_eq!(
            validate(&sub, Utc::now()),
            Err(RejectionReason::MissingMandatoryFields)
        );
    }

    #[test]
    fn test_first_failure_wins() {
        // Duration check outranks the missing-field check.
        let mut sub = submission(-1);
        sub.event_id = String::new();
        assert_eq!(
            validate(&sub, Utc::now()),
            Err(RejectionReason::InvalidDuration)
        );

        // Future-time check outranks the missing-field check.
        let now = Utc::now();
        let mut sub = submission(1000);
        sub.event_id = String::new();
        sub.event_time = now + Duration::minutes(20);
        assert_eq!(validate(&sub, now), Err(RejectionReason::FutureEventTime));
    }

    #[test]
    fn test_reason_codes_serialize_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&RejectionReason::InvalidDuration).unwrap(),
            "\"INVALID_DURATION\""
        );
        assert_eq!(
            RejectionReason::MissingMandatoryFields.as_str(),
            "MISSING_MANDATORY_FIELDS"
        );
        assert_eq!(
            RejectionReason::FutureEventTime.to_string(),
            "FUTURE_EVENT_TIME"
        );
    }
}
