//! Read-side projection of tracker state into flat export rows.
//!
//! Projection never mutates state. Records that fail interval validation are
//! dropped from the output and logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::{TimeInterval, format_timestamp};
use crate::record::{ActiveTimer, LogRecord, TrackerState};
use crate::task::CaptureType;

/// Knobs for [`project`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportOptions {
    /// Emit the running timer as if it ended at export time.
    pub include_running_as_ended: bool,
    /// Drop rows without a recorded end, including the running timer.
    pub only_ended: bool,
    /// Floor applied to every row's duration.
    pub min_duration_seconds: i64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_running_as_ended: true,
            only_ended: false,
            min_duration_seconds: 0,
        }
    }
}

/// A flattened, serialization-ready view of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub id: String,
    pub title: String,
    pub url: String,
    pub project_name: String,
    pub capture_type: CaptureType,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<i64>,
}

/// Rows produced for an export, stamped with the projection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub rows: Vec<ExportRow>,
    pub exported_at: String,
}

/// Unsent records ready for the remote service, with their log positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPush {
    pub rows: Vec<ExportRow>,
    pub indexes: Vec<usize>,
    pub exported_at: String,
}

impl PendingPush {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Projects `state` into rows sorted by start time.
pub fn project(state: &TrackerState, now: DateTime<Utc>, options: ExportOptions) -> Vec<ExportRow> {
    let mut entries: Vec<(DateTime<Utc>, ExportRow)> = state
        .logs
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            let interval = valid_interval(idx, record)?;
            Some((
                interval.start(),
                ended_row(record, interval, options.min_duration_seconds),
            ))
        })
        .collect();

    if let Some(active) = state.running() {
        if let Some(entry) = running_entry(active, now, options) {
            entries.push(entry);
        }
    }

    entries.sort_by_key(|(start, _)| *start);
    entries.into_iter().map(|(_, row)| row).collect()
}

/// Unsent, valid records for the remote service.
///
/// Durations are floored at one second; the running timer is never included.
pub fn pending_for_push(state: &TrackerState, now: DateTime<Utc>) -> PendingPush {
    let mut entries: Vec<(DateTime<Utc>, usize, ExportRow)> = state
        .logs
        .iter()
        .enumerate()
        .filter(|(_, record)| !record.sent)
        .filter_map(|(idx, record)| {
            let interval = valid_interval(idx, record)?;
            Some((interval.start(), idx, ended_row(record, interval, 1)))
        })
        .collect();
    entries.sort_by_key(|(start, idx, _)| (*start, *idx));

    let mut pending = PendingPush {
        rows: Vec::with_capacity(entries.len()),
        indexes: Vec::with_capacity(entries.len()),
        exported_at: format_timestamp(now),
    };
    for (_, idx, row) in entries {
        pending.indexes.push(idx);
        pending.rows.push(row);
    }
    pending
}

/// Formats a second count as `HH:MM:SS`; negative input shows as zero.
#[must_use]
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

fn valid_interval(idx: usize, record: &LogRecord) -> Option<TimeInterval> {
    match record.interval() {
        Ok(interval) => Some(interval),
        Err(err) => {
            tracing::warn!(
                index = idx,
                task_id = %record.task.id,
                error = %err,
                "dropping malformed record from export"
            );
            None
        }
    }
}

fn ended_row(record: &LogRecord, interval: TimeInterval, min_duration_seconds: i64) -> ExportRow {
    ExportRow {
        id: record.task.id.clone(),
        title: record.task.title.clone(),
        url: record.task.url.clone(),
        project_name: record.task.project_name.clone(),
        capture_type: record.task.capture_type,
        started_at: record.started_at.clone(),
        ended_at: Some(record.ended_at.clone()),
        duration_seconds: Some(interval.rounded_seconds().max(min_duration_seconds)),
    }
}

fn running_entry(
    active: &ActiveTimer,
    now: DateTime<Utc>,
    options: ExportOptions,
) -> Option<(DateTime<Utc>, ExportRow)> {
    if options.only_ended {
        return None;
    }

    if options.include_running_as_ended {
        let synthesized = active.clone().finish(format_timestamp(now));
        let interval = match active.interval_until(now) {
            Ok(interval) => interval,
            Err(err) => {
                tracing::warn!(task_id = %active.task.id, error = %err, "dropping running timer from export");
                return None;
            }
        };
        return Some((
            interval.start(),
            ended_row(&synthesized, interval, options.min_duration_seconds),
        ));
    }

    let Some(start) = active.started_at() else {
        tracing::warn!(task_id = %active.task.id, "dropping running timer with unparseable start");
        return None;
    };
    Some((
        start,
        ExportRow {
            id: active.task.id.clone(),
            title: active.task.title.clone(),
            url: active.task.url.clone(),
            project_name: active.task.project_name.clone(),
            capture_type: active.task.capture_type,
            started_at: active.started_at.clone(),
            ended_at: None,
            duration_seconds: None,
        },
    ))
}
