//! The tracker service: every operation is a load, a pure transition, and a
//! save of the whole state.
//!
//! State is reloaded for each call and written back only when the transition
//! succeeded, so a failed operation leaves the store exactly as it was.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::{StoreError, TrackerError};
use crate::interval::{InvalidInterval, format_timestamp};
use crate::projection::{self, ExportData, ExportOptions, PendingPush};
use crate::reconcile::{self, RawRow};
use crate::record::{ActiveTimer, LogRecord, TrackerState};
use crate::task::TaskRef;
use crate::timer::{self, TimerAction};

/// Durable home of the tracker state.
///
/// `save` replaces the whole state at once; a partially written state must
/// never be observable through `load`.
pub trait StateStore {
    fn load(&self) -> Result<TrackerState, StoreError>;
    fn save(&mut self, state: &TrackerState) -> Result<(), StoreError>;
}

/// In-memory store, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: TrackerState,
    fail_writes: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new(state: TrackerState) -> Self {
        Self {
            state,
            fail_writes: false,
        }
    }

    /// A store whose every `save` fails.
    #[must_use]
    pub fn failing_writes(state: TrackerState) -> Self {
        Self {
            state,
            fail_writes: true,
        }
    }

}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<TrackerState, StoreError> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &TrackerState) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::new("memory store is read-only"));
        }
        self.state = state.clone();
        Ok(())
    }
}

/// Tracker operations over a [`StateStore`].
#[derive(Debug)]
pub struct Tracker<S> {
    store: S,
}

impl<S: StateStore> Tracker<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Current state, unchanged.
    pub fn status(&self) -> Result<TrackerState, TrackerError> {
        Ok(self.store.load()?)
    }

    /// Starts or stops the timer for `task` at the current time.
    pub fn start_or_stop(&mut self, task: TaskRef) -> Result<TimerAction, TrackerError> {
        self.start_or_stop_at(task, Utc::now())
    }

    /// Starts or stops the timer for `task` at `now`.
    pub fn start_or_stop_at(
        &mut self,
        mut task: TaskRef,
        now: DateTime<Utc>,
    ) -> Result<TimerAction, TrackerError> {
        task.id = task.id.trim().to_string();
        if task.id.is_empty() {
            return Err(TrackerError::InvalidRequest {
                reason: "task id must not be empty".to_string(),
            });
        }

        let mut state = self.store.load()?;
        let action = timer::toggle_at(&mut state, task, now);
        self.store.save(&state)?;
        Ok(action)
    }

    /// Restarts the task of the record at `position` in the start-ordered log.
    pub fn resume_at(
        &mut self,
        position: usize,
        now: DateTime<Utc>,
    ) -> Result<TimerAction, TrackerError> {
        let state = self.store.load()?;
        let sorted = state.sorted_logs();
        let Some(record) = sorted.get(position) else {
            return Err(TrackerError::InvalidRequest {
                reason: format!(
                    "no record at position {position} (log has {} records)",
                    sorted.len()
                ),
            });
        };
        if state
            .running()
            .is_some_and(|active| active.task.is_same_task(&record.task))
        {
            return Err(TrackerError::InvalidRequest {
                reason: format!("task {} is already running", record.task.id),
            });
        }
        let task = record.task.clone();
        self.start_or_stop_at(task, now)
    }

    /// Stops the running timer, if any, at `end` (defaults to now).
    pub fn stop_if_any(
        &mut self,
        end: Option<DateTime<Utc>>,
    ) -> Result<Option<LogRecord>, TrackerError> {
        self.stop_if_any_at(end, Utc::now())
    }

    /// Stops the running timer, if any, at `end` or else at `now`.
    ///
    /// `end` may not precede the timer's start or lie after `now`. A zero
    /// length stop is still recorded.
    pub fn stop_if_any_at(
        &mut self,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Option<LogRecord>, TrackerError> {
        let end = end.unwrap_or(now);
        let mut state = self.store.load()?;
        if let Some(active) = state.running() {
            check_stop(active, end, now)?;
        }
        let Some(stopped) = timer::stop_if_any_at(&mut state, end) else {
            return Ok(None);
        };
        self.store.save(&state)?;
        tracing::debug!(task_id = %stopped.task.id, ended_at = %stopped.ended_at, "stopped timer");
        Ok(Some(stopped))
    }

    /// Drops every stored record; the running timer survives.
    pub fn clear_logs(&mut self) -> Result<usize, TrackerError> {
        let mut state = self.store.load()?;
        let cleared = state.clear_logs();
        self.store.save(&state)?;
        tracing::info!(cleared, "cleared logs");
        Ok(cleared)
    }

    pub fn export_data(&self, options: ExportOptions) -> Result<ExportData, TrackerError> {
        self.export_data_at(options, Utc::now())
    }

    /// Projects state as of `now` without changing it.
    pub fn export_data_at(
        &self,
        options: ExportOptions,
        now: DateTime<Utc>,
    ) -> Result<ExportData, TrackerError> {
        let state = self.store.load()?;
        Ok(ExportData {
            rows: projection::project(&state, now, options),
            exported_at: format_timestamp(now),
        })
    }

    pub fn import_logs(&mut self, rows: &[RawRow]) -> Result<usize, TrackerError> {
        self.import_logs_at(rows, Utc::now())
    }

    /// Imports `rows` all-or-nothing, checking them against the state at `now`.
    pub fn import_logs_at(
        &mut self,
        rows: &[RawRow],
        now: DateTime<Utc>,
    ) -> Result<usize, TrackerError> {
        let mut state = self.store.load()?;
        let accepted = reconcile::plan_import(&state, rows, now)?;
        let imported = reconcile::commit_import(&mut state, accepted);
        self.store.save(&state)?;
        tracing::info!(imported, total = state.logs.len(), "imported records");
        Ok(imported)
    }

    pub fn pending_for_push(&self) -> Result<PendingPush, TrackerError> {
        self.pending_for_push_at(Utc::now())
    }

    pub fn pending_for_push_at(&self, now: DateTime<Utc>) -> Result<PendingPush, TrackerError> {
        let state = self.store.load()?;
        Ok(projection::pending_for_push(&state, now))
    }

    /// Flags log positions as sent. Repeating a call changes nothing.
    pub fn mark_sent(&mut self, indexes: &[usize]) -> Result<usize, TrackerError> {
        let indexes: BTreeSet<usize> = indexes.iter().copied().collect();
        let mut state = self.store.load()?;
        let marked = state.mark_sent(&indexes);
        if marked > 0 {
            self.store.save(&state)?;
        }
        tracing::debug!(requested = indexes.len(), marked, "marked records as sent");
        Ok(marked)
    }
}

fn check_stop(
    active: &ActiveTimer,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), TrackerError> {
    if end > now {
        return Err(TrackerError::InvalidStop {
            source: InvalidInterval::EndsInFuture {
                end: format_timestamp(end),
                now: format_timestamp(now),
            },
        });
    }
    // Unparseable legacy starts are closed as-is.
    if active.started_at().is_some_and(|start| end < start) {
        return Err(TrackerError::InvalidStop {
            source: InvalidInterval::NonPositiveDuration {
                start: active.started_at.clone(),
                end: format_timestamp(end),
            },
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use serde_json::json;

    use crate::interval::parse_instant;

    fn t0() -> DateTime<Utc> {
        parse_instant("2024-01-01T10:00:00Z").unwrap()
    }

    fn rows(value: serde_json::Value) -> Vec<RawRow> {
        serde_json::from_value(value).unwrap()
    }

    fn tracker_with(logs: Vec<LogRecord>) -> Tracker<MemoryStore> {
        Tracker::new(MemoryStore::new(TrackerState { active: None, logs }))
    }

    fn stored(id: &str, start: &str, end: &str) -> LogRecord {
        ActiveTimer::new(TaskRef::new(id, id), start).finish(end)
    }

    #[test]
    fn toggle_persists_running_timer_and_log() {
        let mut tracker = Tracker::new(MemoryStore::default());
        tracker
            .start_or_stop_at(TaskRef::new("A", "Task A"), t0())
            .unwrap();
        tracker
            .start_or_stop_at(TaskRef::new("B", "Task B"), t0() + Duration::minutes(10))
            .unwrap();

        let state = tracker.status().unwrap();
        assert_eq!(state.running().unwrap().task.id, "B");
        assert_eq!(state.logs.len(), 1);
        assert_eq!(state.logs[0].ended_at, "2024-01-01T10:10:00.000Z");
    }

    #[test]
    fn toggle_rejects_blank_id() {
        let mut tracker = Tracker::new(MemoryStore::default());
        let err = tracker
            .start_or_stop_at(TaskRef::new("  ", "Nothing"), t0())
            .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        assert_eq!(tracker.status().unwrap(), TrackerState::default());
    }

    #[test]
    fn stop_when_idle_leaves_state_alone() {
        let mut tracker = tracker_with(vec![]);
        assert!(tracker.stop_if_any_at(None, t0()).unwrap().is_none());
        assert!(tracker.stop_if_any(None).unwrap().is_none());
        assert!(tracker.status().unwrap().logs.is_empty());
    }

    #[test]
    fn stop_if_any_defaults_end_to_now() {
        let mut tracker = Tracker::new(MemoryStore::default());
        tracker
            .start_or_stop_at(TaskRef::new("A", "Task A"), t0())
            .unwrap();

        let before = Utc::now();
        let stopped = tracker.stop_if_any(None).unwrap().unwrap();
        let ended = parse_instant(&stopped.ended_at).unwrap();
        assert!(ended >= before - Duration::seconds(1));
        assert!(tracker.status().unwrap().running().is_none());
    }

    #[test]
    fn stop_if_any_uses_given_end() {
        let mut tracker = Tracker::new(MemoryStore::default());
        tracker
            .start_or_stop_at(TaskRef::new("A", "Task A"), t0())
            .unwrap();

        let stopped = tracker
            .stop_if_any(Some(t0() + Duration::minutes(25)))
            .unwrap()
            .unwrap();
        assert_eq!(stopped.ended_at, "2024-01-01T10:25:00.000Z");
        assert_eq!(tracker.status().unwrap().logs, [stopped]);
    }

    #[test]
    fn stop_rejects_end_before_start() {
        let mut tracker = Tracker::new(MemoryStore::default());
        tracker
            .start_or_stop_at(TaskRef::new("A", "Task A"), t0())
            .unwrap();
        let before = tracker.status().unwrap();

        let err = tracker
            .stop_if_any_at(Some(t0() - Duration::hours(1)), t0() + Duration::hours(1))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_interval");
        assert_eq!(tracker.status().unwrap(), before);
    }

    #[test]
    fn stop_rejects_end_after_now() {
        let mut tracker = Tracker::new(MemoryStore::default());
        tracker
            .start_or_stop_at(TaskRef::new("A", "Task A"), t0())
            .unwrap();

        let err = tracker
            .stop_if_any_at(Some(t0() + Duration::hours(2)), t0() + Duration::hours(1))
            .unwrap_err();
        assert!(matches!(
            err,
            TrackerError::InvalidStop {
                source: InvalidInterval::EndsInFuture { .. }
            }
        ));
        assert!(tracker.status().unwrap().running().is_some());
    }

    #[test]
    fn imported_rows_never_overlap_later_timers() {
        let mut tracker = Tracker::new(MemoryStore::default());
        let err = tracker
            .import_logs_at(
                &rows(json!([{
                    "id": "X",
                    "startedAt": "2024-01-01T11:00:00Z",
                    "endedAt": "2024-01-01T12:00:00Z"
                }])),
                t0(),
            )
            .unwrap_err();
        assert_eq!(err.code(), "invalid_interval");

        tracker
            .start_or_stop_at(TaskRef::new("A", "Task A"), t0())
            .unwrap();
        tracker
            .start_or_stop_at(TaskRef::new("A", "Task A"), t0() + Duration::hours(3))
            .unwrap();

        let logs = tracker.status().unwrap().logs;
        assert_eq!(logs.len(), 1);
        for (i, a) in logs.iter().enumerate() {
            for b in &logs[i + 1..] {
                assert!(!a.interval().unwrap().overlaps(&b.interval().unwrap()));
            }
        }
    }

    #[test]
    fn import_rejects_overlap_with_running_timer() {
        let mut tracker = Tracker::new(MemoryStore::default());
        tracker
            .start_or_stop_at(TaskRef::new("A", "Task A"), t0())
            .unwrap();
        let before = tracker.status().unwrap();

        let err = tracker
            .import_logs_at(
                &rows(json!([{
                    "id": "X",
                    "startedAt": "2024-01-01T10:05:00Z",
                    "endedAt": "2024-01-01T10:10:00Z"
                }])),
                t0() + Duration::minutes(30),
            )
            .unwrap_err();

        assert_eq!(err.code(), "external_conflict");
        assert_eq!(tracker.status().unwrap(), before);
    }

    #[test]
    fn import_is_all_or_nothing() {
        let mut tracker = tracker_with(vec![stored(
            "A",
            "2024-01-01T10:00:00Z",
            "2024-01-01T11:00:00Z",
        )]);
        let err = tracker
            .import_logs_at(
                &rows(json!([
                    {"id": "1", "startedAt": "2024-01-01T08:00:00Z", "endedAt": "2024-01-01T09:00:00Z"},
                    {"id": "2", "startedAt": "2024-01-01T12:00:00Z", "endedAt": "2024-01-01T11:30:00Z"}
                ])),
                t0(),
            )
            .unwrap_err();
        assert_eq!(err.code(), "invalid_interval");
        assert_eq!(tracker.status().unwrap().logs.len(), 1);
    }

    #[test]
    fn import_appends_sorted_unsent_records() {
        let mut tracker = tracker_with(vec![stored(
            "A",
            "2024-01-01T10:00:00Z",
            "2024-01-01T11:00:00Z",
        )]);
        let imported = tracker
            .import_logs_at(
                &rows(json!([
                    {"id": "late", "startedAt": "2024-01-01T11:00:00Z", "endedAt": "2024-01-01T11:30:00Z", "sent": true},
                    {"id": "early", "startedAt": "2024-01-01T09:00:00Z", "endedAt": "2024-01-01T10:00:00Z"}
                ])),
                t0() + Duration::hours(5),
            )
            .unwrap();
        assert_eq!(imported, 2);

        let state = tracker.status().unwrap();
        let ids: Vec<&str> = state.logs.iter().map(|r| r.task.id.as_str()).collect();
        assert_eq!(ids, ["early", "A", "late"]);
        assert!(state.logs.iter().all(|r| !r.sent));
    }

    #[test]
    fn failed_save_is_reported_and_state_kept() {
        let initial = TrackerState {
            active: None,
            logs: vec![stored("A", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")],
        };
        let mut tracker = Tracker::new(MemoryStore::failing_writes(initial.clone()));

        let err = tracker.clear_logs().unwrap_err();
        assert_eq!(err.code(), "storage_failure");
        assert_eq!(tracker.status().unwrap(), initial);
    }

    #[test]
    fn push_cycle_marks_records_sent() {
        let mut tracker = tracker_with(vec![
            stored("A", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z"),
            stored("B", "2024-01-01T08:00:00Z", "2024-01-01T09:00:00Z"),
        ]);

        let pending = tracker.pending_for_push_at(t0()).unwrap();
        assert_eq!(pending.indexes, [1, 0]);
        assert_eq!(tracker.mark_sent(&pending.indexes).unwrap(), 2);
        assert_eq!(tracker.mark_sent(&pending.indexes).unwrap(), 2);
        assert!(tracker.pending_for_push_at(t0()).unwrap().is_empty());
    }

    #[test]
    fn mark_sent_ignores_stale_indexes() {
        let mut tracker = tracker_with(vec![stored(
            "A",
            "2024-01-01T10:00:00Z",
            "2024-01-01T11:00:00Z",
        )]);
        assert_eq!(tracker.mark_sent(&[0, 7]).unwrap(), 1);
        assert!(tracker.status().unwrap().logs[0].sent);
    }

    #[test]
    fn clear_keeps_running_timer() {
        let mut tracker = tracker_with(vec![stored(
            "A",
            "2024-01-01T08:00:00Z",
            "2024-01-01T09:00:00Z",
        )]);
        tracker
            .start_or_stop_at(TaskRef::new("B", "Task B"), t0())
            .unwrap();
        assert_eq!(tracker.clear_logs().unwrap(), 1);

        let state = tracker.status().unwrap();
        assert!(state.logs.is_empty());
        assert_eq!(state.running().unwrap().task.id, "B");
    }

    #[test]
    fn resume_restarts_task_by_sorted_position() {
        let mut tracker = tracker_with(vec![
            stored("late", "2024-01-01T09:00:00Z", "2024-01-01T09:30:00Z"),
            stored("early", "2024-01-01T07:00:00Z", "2024-01-01T08:00:00Z"),
        ]);
        let action = tracker.resume_at(0, t0()).unwrap();
        let TimerAction::Started { started } = action else {
            panic!("expected Started, got {action:?}");
        };
        assert_eq!(started.task.id, "early");

        let err = tracker.resume_at(5, t0()).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn resume_refuses_task_already_running() {
        let mut tracker = tracker_with(vec![stored(
            "A",
            "2024-01-01T07:00:00Z",
            "2024-01-01T08:00:00Z",
        )]);
        tracker.start_or_stop_at(TaskRef::new("A", "A"), t0()).unwrap();
        let err = tracker
            .resume_at(0, t0() + Duration::minutes(1))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        assert!(tracker.status().unwrap().running().is_some());
    }

    #[test]
    fn export_does_not_stop_running_timer() {
        let mut tracker = Tracker::new(MemoryStore::default());
        tracker
            .start_or_stop_at(TaskRef::new("A", "Task A"), t0())
            .unwrap();
        let data = tracker
            .export_data_at(ExportOptions::default(), t0() + Duration::minutes(15))
            .unwrap();
        assert_eq!(data.rows[0].duration_seconds, Some(900));
        assert_eq!(data.exported_at, "2024-01-01T10:15:00.000Z");
        assert!(tracker.status().unwrap().running().is_some());
    }
}
