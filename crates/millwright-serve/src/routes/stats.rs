//! Stats endpoints for the read-only aggregation path.
//!
//! Both endpoints are simple filter-and-reduce over a time-window fetch from
//! the event store; the aggregation math lives in pure helpers so it can be
//! tested without HTTP or storage.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use millwright_core::EventRecord;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Defect rate (defects per hour) at or above which a machine is flagged.
const WARNING_DEFECT_RATE: f64 = 2.0;

// ═══════════════════════════════════════════════════════════════════════════
// Machine stats
// ═══════════════════════════════════════════════════════════════════════════

/// Query parameters for machine stats.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatsQuery {
    pub machine_id: String,
    /// Window start, inclusive (RFC 3339).
    pub start: DateTime<Utc>,
    /// Window end, exclusive (RFC 3339).
    pub end: DateTime<Utc>,
}

/// Per-machine defect stats over a time window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatsResponse {
    pub machine_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// All events in the window, unknown-defect events included.
    pub events_count: u64,
    /// Sum of defect counts, unknown sentinels excluded.
    pub defects_count: i64,
    /// Defects per hour over the window.
    pub avg_defect_rate: f64,
    /// "Healthy" below the warning rate, "Warning" at or above it.
    pub status: &'static str,
}

/// `GET /stats?machineId=M1&start=...&end=...`
pub async fn machine_stats(
    State(state): State<AppState>,
    Query(params): Query<MachineStatsQuery>,
) -> Result<Json<MachineStatsResponse>, ApiError> {
    if params.end < params.start {
        return Err(ApiError::BadRequest(
            "end must not be before start".to_string(),
        ));
    }

    let events = state
        .store
        .find_by_machine(&params.machine_id, params.start, params.end)
        .await?;

    Ok(Json(compute_machine_stats(
        params.machine_id,
        &events,
        params.start,
        params.end,
    )))
}

fn compute_machine_stats(
    machine_id: String,
    events: &[EventRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> MachineStatsResponse {
    let events_count = events.len() as u64;
    let defects_count: i64 = events.iter().filter_map(EventRecord::known_defects).sum();

    // Zero-length windows are treated as one hour to avoid dividing by zero.
    let mut window_hours = (end - start).num_seconds() as f64 / 3600.0;
    if window_hours == 0.0 {
        window_hours = 1.0;
    }

    let avg_defect_rate = defects_count as f64 / window_hours;
    let status = if avg_defect_rate < WARNING_DEFECT_RATE {
        "Healthy"
    } else {
        "Warning"
    };

    MachineStatsResponse {
        machine_id,
        start,
        end,
        events_count,
        defects_count,
        avg_defect_rate,
        status,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Top defect lines
// ═══════════════════════════════════════════════════════════════════════════

/// Query parameters for the top-defect-lines ranking.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopDefectLinesQuery {
    /// Window start, inclusive (RFC 3339).
    pub from: DateTime<Utc>,
    /// Window end, exclusive (RFC 3339).
    pub to: DateTime<Utc>,
    /// Maximum number of lines to return (default: 10).
    pub limit: Option<usize>,
}

/// One production line's defect totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDefects {
    /// Line identifier; empty for events submitted without one.
    pub line_id: String,
    /// Sum of defect counts, unknown sentinels excluded.
    pub total_defects: i64,
    /// All events on the line, unknown-defect events included.
    pub event_count: u64,
    pub defects_percent: f64,
}

/// `GET /stats/top-defect-lines?from=...&to=...&limit=10`
pub async fn top_defect_lines(
    State(state): State<AppState>,
    Query(params): Query<TopDefectLinesQuery>,
) -> Result<Json<Vec<LineDefects>>, ApiError> {
    if params.to < params.from {
        return Err(ApiError::BadRequest(
            "to must not be before from".to_string(),
        ));
    }

    let events = state.store.find_in_window(params.from, params.to).await?;
    let limit = params.limit.unwrap_or(10);

    Ok(Json(rank_defect_lines(&events, limit)))
}

fn rank_defect_lines(events: &[EventRecord], limit: usize) -> Vec<LineDefects> {
    let mut by_line: HashMap<String, (i64, u64)> = HashMap::new();

    for event in events {
        let line = event.line_id.clone().unwrap_or_default();
        let entry = by_line.entry(line).or_default();
        entry.0 += event.known_defects().unwrap_or(0);
        entry.1 += 1;
    }

    let mut lines: Vec<LineDefects> = by_line
        .into_iter()
        .map(|(line_id, (total_defects, event_count))| LineDefects {
            line_id,
            total_defects,
            event_count,
            defects_percent: total_defects as f64 * 100.0 / event_count as f64,
        })
        .collect();

    // Ties broken by line id so the ranking is stable.
    lines.sort_by(|a, b| {
        b.total_defects
            .cmp(&a.total_defects)
            .then_with(|| a.line_id.cmp(&b.line_id))
    });
    lines.truncate(limit);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use millwright_core::UNKNOWN_DEFECTS;

    fn event(machine: &str, line: Option<&str>, defects: i32) -> EventRecord {
        let now = Utc::now();
        EventRecord {
            event_id: format!("E-{machine}-{defects}"),
            machine_id: machine.to_string(),
            line_id: line.map(str::to_string),
            event_time: now,
            received_time: now,
            duration_ms: 1000,
            defect_count: defects,
        }
    }

    #[test]
    fn test_machine_stats_excludes_unknown_defects() {
        let start = Utc::now();
        let end = start + Duration::hours(10);
        let events = vec![
            event("M1", Some("L1"), 5),
            event("M1", Some("L1"), UNKNOWN_DEFECTS),
        ];

        let stats = compute_machine_stats("M1".to_string(), &events, start, end);

        // The sentinel event is counted in totals but not in defect sums.
        assert_eq!(stats.events_count, 2);
        assert_eq!(stats.defects_count, 5);
        assert_eq!(stats.avg_defect_rate, 0.5);
        assert_eq!(stats.status, "Healthy");
    }

    #[test]
    fn test_machine_stats_warning_threshold() {
        let start = Utc::now();
        let end = start + Duration::hours(1);

        // 2 defects/hour is flagged, anything below it is healthy.
        let stats = compute_machine_stats(
            "M1".to_string(),
            &[event("M1", None, 2)],
            start,
            end,
        );
        assert_eq!(stats.status, "Warning");

        let stats = compute_machine_stats(
            "M1".to_string(),
            &[event("M1", None, 1)],
            start,
            end,
        );
        assert_eq!(stats.status, "Healthy");
    }

    #[test]
    fn test_machine_stats_zero_window_guard() {
        let start = Utc::now();
        let stats = compute_machine_stats(
            "M1".to_string(),
            &[event("M1", None, 3)],
            start,
            start,
        );
        // A zero-length window is treated as one hour.
        assert_eq!(stats.avg_defect_rate, 3.0);
    }

    #[test]
    fn test_rank_defect_lines_orders_and_truncates() {
        let events = vec![
            event("M1", Some("L1"), 1),
            event("M1", Some("L2"), 5),
            event("M2", Some("L2"), 2),
            event("M2", Some("L3"), 3),
        ];

        let ranked = rank_defect_lines(&events, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].line_id, "L2");
        assert_eq!(ranked[0].total_defects, 7);
        assert_eq!(ranked[0].event_count, 2);
        assert_eq!(ranked[0].defects_percent, 350.0);
        assert_eq!(ranked[1].line_id, "L3");
    }

    #[test]
    fn test_rank_defect_lines_unknown_defects_count_events_only() {
        let events = vec![
            event("M1", Some("L1"), UNKNOWN_DEFECTS),
            event("M1", Some("L1"), 4),
        ];

        let ranked = rank_defect_lines(&events, 10);
        assert_eq!(ranked[0].total_defects, 4);
        assert_eq!(ranked[0].event_count, 2);
        assert_eq!(ranked[0].defects_percent, 200.0);
    }

    #[test]
    fn test_rank_defect_lines_groups_missing_line_under_empty_bucket() {
        let events = vec![event("M1", None, 2), event("M2", None, 1)];

        let ranked = rank_defect_lines(&events, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].line_id, "");
        assert_eq!(ranked[0].total_defects, 3);
    }
}
