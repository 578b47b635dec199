//! The persisted state aggregate: the running timer and the completed log.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::{InvalidInterval, TimeInterval, parse_instant};
use crate::task::{TaskRef, lenient_string};

/// The single in-progress tracking session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTimer {
    #[serde(flatten)]
    pub task: TaskRef,
    #[serde(default, deserialize_with = "lenient_string")]
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
}

impl ActiveTimer {
    pub fn new(task: TaskRef, started_at: impl Into<String>) -> Self {
        Self {
            task,
            started_at: started_at.into(),
            ended_at: None,
        }
    }

    /// True while no end has been recorded.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ended_at.as_deref().is_none_or(|end| end.trim().is_empty())
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.started_at)
    }

    /// The interval the timer would cover if it ended at `end`.
    pub fn interval_until(&self, end: DateTime<Utc>) -> Result<TimeInterval, InvalidInterval> {
        let start = parse_instant(&self.started_at).ok_or_else(|| InvalidInterval::Unparseable {
            field: "startedAt",
            value: self.started_at.clone(),
        })?;
        TimeInterval::new(start, end)
    }

    /// Converts the timer into a completed record ending at `ended_at`.
    #[must_use]
    pub fn finish(self, ended_at: impl Into<String>) -> LogRecord {
        LogRecord {
            task: self.task,
            started_at: self.started_at,
            ended_at: ended_at.into(),
            sent: false,
            duration_seconds: None,
        }
    }
}

/// A completed, immutable time record. Only `sent` may change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(flatten)]
    pub task: TaskRef,
    #[serde(default, deserialize_with = "lenient_string")]
    pub started_at: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ended_at: String,
    #[serde(default)]
    pub sent: bool,
    /// Duration supplied by an import source; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl LogRecord {
    pub fn interval(&self) -> Result<TimeInterval, InvalidInterval> {
        TimeInterval::validate(&self.started_at, &self.ended_at)
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.started_at)
    }
}

/// Everything the tracker persists, read and written as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    #[serde(rename = "currentTask", default)]
    pub active: Option<ActiveTimer>,
    #[serde(default)]
    pub logs: Vec<LogRecord>,
}

impl TrackerState {
    /// The active timer, if one is actually running.
    #[must_use]
    pub fn running(&self) -> Option<&ActiveTimer> {
        self.active.as_ref().filter(|active| active.is_running())
    }

    /// Positions of `logs` ordered by start time; unparseable starts sort last.
    #[must_use]
    pub fn sorted_positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = (0..self.logs.len()).collect();
        positions.sort_by_key(|&idx| start_sort_key(&self.logs[idx]));
        positions
    }

    /// Records ordered by start time, without touching the stored order.
    #[must_use]
    pub fn sorted_logs(&self) -> Vec<&LogRecord> {
        self.sorted_positions()
            .into_iter()
            .map(|idx| &self.logs[idx])
            .collect()
    }

    /// Reorders the stored log by start time.
    pub fn sort_logs(&mut self) {
        self.logs.sort_by_key(start_sort_key);
    }

    /// Empties the log. The active timer is untouched.
    pub fn clear_logs(&mut self) -> usize {
        let cleared = self.logs.len();
        self.logs.clear();
        cleared
    }

    /// Flags the given log positions as sent, skipping stale ones.
    ///
    /// Returns how many positions were in range.
    pub fn mark_sent(&mut self, indexes: &BTreeSet<usize>) -> usize {
        let mut marked = 0;
        for &idx in indexes {
            match self.logs.get_mut(idx) {
                Some(record) => {
                    record.sent = true;
                    marked += 1;
                }
                None => tracing::warn!(index = idx, "skipping out-of-range log index"),
            }
        }
        marked
    }
}

fn start_sort_key(record: &LogRecord) -> (bool, Option<DateTime<Utc>>) {
    let start = record.started_at();
    (start.is_none(), start)
}
