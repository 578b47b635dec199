//! Timer state machine.
//!
//! The tracker is either idle or running exactly one task. Starting any task
//! implicitly stops whatever was running, so switching between work items is
//! a single transition and there is never more than one open timer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::interval::format_timestamp;
use crate::record::{ActiveTimer, LogRecord, TrackerState};
use crate::task::TaskRef;

/// Outcome of a toggle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TimerAction {
    /// A new timer is running for the task.
    Started { started: ActiveTimer },
    /// The task's timer was stopped and logged.
    Stopped { stopped: LogRecord },
}

/// Starts or stops `task` at `now`.
///
/// If `task` is the one running, it is stopped. Otherwise any running timer
/// is closed at `now` and a new one is started for `task`.
pub fn toggle_at(state: &mut TrackerState, task: TaskRef, now: DateTime<Utc>) -> TimerAction {
    let same_task = state
        .running()
        .is_some_and(|running| running.task.is_same_task(&task));

    if same_task {
        if let Some(stopped) = stop_if_any_at(state, now) {
            tracing::debug!(task_id = %stopped.task.id, "stopped timer");
            return TimerAction::Stopped { stopped };
        }
    }

    if let Some(previous) = stop_if_any_at(state, now) {
        tracing::debug!(task_id = %previous.task.id, "stopped previous timer on switch");
    }

    let started = ActiveTimer::new(task, format_timestamp(now));
    tracing::debug!(task_id = %started.task.id, started_at = %started.started_at, "started timer");
    state.active = Some(started.clone());
    TimerAction::Started { started }
}

/// Closes the running timer at `end`, appending its record to the log.
///
/// Returns `None` and leaves the state untouched when nothing is running.
pub fn stop_if_any_at(state: &mut TrackerState, end: DateTime<Utc>) -> Option<LogRecord> {
    state.running()?;
    let active = state.active.take()?;
    let record = active.finish(format_timestamp(end));
    state.logs.push(record.clone());
    Some(record)
}
