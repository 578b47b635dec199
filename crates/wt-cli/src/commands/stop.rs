//! Stop command.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use wt_core::{StateStore, Tracker};

use super::util::{parse_datetime, record_duration, task_label};

#[derive(Debug, Args)]
pub struct StopArgs {
    /// When the work ended (ISO 8601 or e.g. "10 minutes ago"). Defaults to now.
    #[arg(long)]
    pub at: Option<String>,
}

pub fn run<W: Write, S: StateStore>(
    writer: &mut W,
    tracker: &mut Tracker<S>,
    args: &StopArgs,
    now: DateTime<Utc>,
) -> Result<()> {
    let end = args
        .at
        .as_deref()
        .map(|raw| parse_datetime(raw, now))
        .transpose()?;

    match tracker.stop_if_any_at(end, now)? {
        Some(stopped) => writeln!(
            writer,
            "Stopped {} after {}",
            task_label(&stopped.task),
            record_duration(&stopped)
        )?,
        None => writeln!(writer, "No timer running.")?,
    }
    Ok(())
}
