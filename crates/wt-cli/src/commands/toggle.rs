//! Toggle command: start a task's timer, or stop it when it is already running.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use wt_core::{CaptureType, StateStore, TaskRef, TimerAction, Tracker};

use super::util::{record_duration, task_label};

#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Work item id.
    pub id: String,

    /// Work item title.
    #[arg(long, default_value = "")]
    pub title: String,

    /// Link back to the work item.
    #[arg(long)]
    pub url: Option<String>,

    /// Project the work item belongs to.
    #[arg(long)]
    pub project: Option<String>,

    /// Where the item came from (azure_devops, glpi, other).
    #[arg(long)]
    pub capture_type: Option<String>,
}

impl ToggleArgs {
    fn task(&self) -> TaskRef {
        let mut task = TaskRef::new(self.id.as_str(), self.title.as_str()).with_capture_type(
            self.capture_type
                .as_deref()
                .map(CaptureType::normalize)
                .unwrap_or_default(),
        );
        if let Some(url) = &self.url {
            task = task.with_url(url.as_str());
        }
        if let Some(project) = &self.project {
            task = task.with_project(project.as_str());
        }
        task
    }
}

pub fn run<W: Write, S: StateStore>(
    writer: &mut W,
    tracker: &mut Tracker<S>,
    args: &ToggleArgs,
    now: DateTime<Utc>,
) -> Result<()> {
    let action = tracker
        .start_or_stop_at(args.task(), now)
        .with_context(|| format!("failed to toggle task {}", args.id))?;
    write_action(writer, &action)
}

/// Prints the outcome of a toggle or resume.
pub fn write_action<W: Write>(writer: &mut W, action: &TimerAction) -> Result<()> {
    match action {
        TimerAction::Started { started } => writeln!(
            writer,
            "Started {} at {}",
            task_label(&started.task),
            started.started_at
        )?,
        TimerAction::Stopped { stopped } => writeln!(
            writer,
            "Stopped {} after {}",
            task_label(&stopped.task),
            record_duration(stopped)
        )?,
    }
    Ok(())
}
