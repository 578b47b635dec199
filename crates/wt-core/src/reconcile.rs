//! Overlap reconciliation for imported records.
//!
//! Imports are two-phase: [`plan_import`] validates a batch against a state
//! snapshot without mutating anything, and [`commit_import`] applies an
//! accepted plan. A batch is either committed in full or rejected in full.
//!
//! # Algorithm
//!
//! 1. Normalize raw rows into candidate records, dropping fully blank rows
//! 2. Validate every candidate interval and reject any ending after now
//!    (first failure rejects the batch)
//! 3. Sort candidates by start and check adjacent pairs for overlap
//! 4. Collect existing intervals: valid stored records plus the running timer
//!    (ending now); unparseable stored records are skipped
//! 5. Reject the batch on the first candidate overlapping an existing interval

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::interval::{InvalidInterval, TimeInterval, format_timestamp, overlaps, parse_instant};
use crate::record::{LogRecord, TrackerState};
use crate::task::{CaptureType, TaskRef, value_to_string};

/// A loosely-typed row from a spreadsheet, JSON file, or another tracker.
///
/// Every field is optional and may be a string, number, or null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRow {
    pub id: Option<serde_json::Value>,
    pub title: Option<serde_json::Value>,
    pub url: Option<serde_json::Value>,
    pub project_name: Option<serde_json::Value>,
    pub capture_type: Option<serde_json::Value>,
    pub started_at: Option<serde_json::Value>,
    pub ended_at: Option<serde_json::Value>,
    pub duration_seconds: Option<serde_json::Value>,
}

impl RawRow {
    /// A row with no id, title, or timestamps carries nothing to import.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        [&self.id, &self.title, &self.started_at, &self.ended_at]
            .into_iter()
            .all(|field| text(field.as_ref()).trim().is_empty())
    }

    /// Converts the row into a candidate record. Never fails; validation is separate.
    #[must_use]
    pub fn normalize(&self) -> LogRecord {
        let task = TaskRef {
            id: text(self.id.as_ref()).trim().to_string(),
            title: text(self.title.as_ref()),
            url: text(self.url.as_ref()),
            project_name: text(self.project_name.as_ref()),
            capture_type: CaptureType::normalize(&text(self.capture_type.as_ref())),
        };
        LogRecord {
            task,
            started_at: timestamp_text(self.started_at.as_ref()),
            ended_at: timestamp_text(self.ended_at.as_ref()),
            sent: false,
            duration_seconds: finite_number(self.duration_seconds.as_ref()),
        }
    }
}

/// Validates `rows` against `state` as of `now`.
///
/// Returns the accepted candidates sorted by start time. Nothing is mutated.
pub fn plan_import(
    state: &TrackerState,
    rows: &[RawRow],
    now: DateTime<Utc>,
) -> Result<Vec<LogRecord>, TrackerError> {
    let mut candidates = Vec::with_capacity(rows.len());
    for (idx, raw) in rows.iter().enumerate() {
        if raw.is_blank() {
            tracing::debug!(row = idx + 1, "skipping blank import row");
            continue;
        }
        let record = raw.normalize();
        let interval = record
            .interval()
            .and_then(|interval| ended_by(interval, now))
            .map_err(|source| TrackerError::InvalidInterval {
                row: idx + 1,
                source,
            })?;
        candidates.push((interval, record));
    }

    if candidates.is_empty() {
        return Err(TrackerError::EmptyBatch);
    }

    candidates.sort_by_key(|(interval, _)| interval.start());
    for pair in candidates.windows(2) {
        let [(a, first), (b, second)] = pair else {
            continue;
        };
        if overlaps(a, b) {
            return Err(TrackerError::InternalConflict {
                first: Box::new(first.clone()),
                second: Box::new(second.clone()),
            });
        }
    }

    let existing = existing_intervals(state, now);
    for (candidate_interval, candidate) in &candidates {
        if let Some((_, conflicting)) = existing
            .iter()
            .find(|(interval, _)| overlaps(candidate_interval, interval))
        {
            return Err(TrackerError::ExternalConflict {
                candidate: Box::new(candidate.clone()),
                conflicting: Box::new(conflicting.clone()),
            });
        }
    }

    Ok(candidates.into_iter().map(|(_, record)| record).collect())
}

/// Appends an accepted plan and re-sorts the log by start time.
pub fn commit_import(state: &mut TrackerState, accepted: Vec<LogRecord>) -> usize {
    let count = accepted.len();
    state
        .logs
        .extend(accepted.into_iter().map(|record| LogRecord {
            sent: false,
            ..record
        }));
    state.sort_logs();
    count
}

/// Rows must be over by `now`; a later timer could otherwise run across them.
fn ended_by(interval: TimeInterval, now: DateTime<Utc>) -> Result<TimeInterval, InvalidInterval> {
    if interval.end() > now {
        return Err(InvalidInterval::EndsInFuture {
            end: format_timestamp(interval.end()),
            now: format_timestamp(now),
        });
    }
    Ok(interval)
}

/// Intervals already claimed by stored records and the running timer.
///
/// Stored records that do not parse are left out of the check and logged.
fn existing_intervals(state: &TrackerState, now: DateTime<Utc>) -> Vec<(TimeInterval, LogRecord)> {
    let mut existing = Vec::with_capacity(state.logs.len() + 1);
    for (idx, record) in state.logs.iter().enumerate() {
        match record.interval() {
            Ok(interval) => existing.push((interval, record.clone())),
            Err(err) => tracing::warn!(
                index = idx,
                task_id = %record.task.id,
                error = %err,
                "excluding malformed stored record from conflict check"
            ),
        }
    }
    if let Some(active) = state.running() {
        match active.interval_until(now) {
            Ok(interval) => {
                existing.push((interval, active.clone().finish(format_timestamp(now))));
            }
            Err(err) => tracing::warn!(
                task_id = %active.task.id,
                error = %err,
                "excluding running timer from conflict check"
            ),
        }
    }
    existing
}

fn text(value: Option<&serde_json::Value>) -> String {
    value.map(value_to_string).unwrap_or_default()
}

/// Timestamps may arrive as text or as epoch milliseconds.
fn timestamp_text(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::Number(number)) => number
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map_or_else(|| number.to_string(), format_timestamp),
        Some(serde_json::Value::String(s)) => {
            let s = s.trim();
            if s.bytes().all(|b| b.is_ascii_digit()) {
                parse_instant(s).map_or_else(|| s.to_string(), format_timestamp)
            } else {
                s.to_string()
            }
        }
        other => text(other),
    }
}

fn finite_number(value: Option<&serde_json::Value>) -> Option<f64> {
    let number = match value? {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
