//! Resume command: start a logged record's task again.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use wt_core::{StateStore, Tracker};

use super::toggle::write_action;

#[derive(Debug, Args)]
pub struct ResumeArgs {
    /// Record index as shown by `wt status`.
    pub index: usize,
}

pub fn run<W: Write, S: StateStore>(
    writer: &mut W,
    tracker: &mut Tracker<S>,
    args: &ResumeArgs,
    now: DateTime<Utc>,
) -> Result<()> {
    let action = tracker
        .resume_at(args.index, now)
        .with_context(|| format!("failed to resume record {}", args.index))?;
    write_action(writer, &action)
}
