//! Status command: the running timer and the most recent records.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use wt_core::{StateStore, Tracker, TrackerState, format_duration, rounded_seconds};

use super::util::{record_duration, task_label};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// How many recent records to list.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Print the raw state as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write, S: StateStore>(
    writer: &mut W,
    tracker: &Tracker<S>,
    args: &StatusArgs,
    now: DateTime<Utc>,
) -> Result<()> {
    let state = tracker.status()?;
    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&state)?)?;
        return Ok(());
    }
    write_status(writer, &state, args.limit, now)
}

fn write_status<W: Write>(
    writer: &mut W,
    state: &TrackerState,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<()> {
    match state.running() {
        Some(active) => {
            let elapsed = active
                .started_at()
                .map(|start| format_duration(rounded_seconds(now - start)))
                .unwrap_or_else(|| "--:--:--".to_string());
            writeln!(
                writer,
                "Running: {} since {} ({elapsed})",
                task_label(&active.task),
                active.started_at
            )?;
        }
        None => writeln!(writer, "No timer running.")?,
    }

    if state.logs.is_empty() {
        writeln!(writer, "No records.")?;
        return Ok(());
    }

    let positions = state.sorted_positions();
    let unsent = state.logs.iter().filter(|record| !record.sent).count();
    writeln!(
        writer,
        "Records: {} ({unsent} unsent), newest first:",
        state.logs.len()
    )?;
    for (index, &position) in positions.iter().enumerate().rev().take(limit) {
        let record = &state.logs[position];
        writeln!(
            writer,
            "{index:>4}  {}  {}  {}{}",
            record.started_at,
            record_duration(record),
            task_label(&record.task),
            if record.sent { "  (sent)" } else { "" }
        )?;
    }
    Ok(())
}
