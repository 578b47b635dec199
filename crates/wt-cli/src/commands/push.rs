//! Push command: send unsent records to the remote work-log service.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use wt_core::{StateStore, Tracker, TrackerError};
use wt_push::{Client, PushPayload, UserProfile};

use crate::Config;

#[derive(Debug, Args)]
pub struct PushArgs {
    /// Print the payload instead of sending it.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run<W: Write, S: StateStore>(
    writer: &mut W,
    tracker: &mut Tracker<S>,
    args: &PushArgs,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    let pending = tracker.pending_for_push_at(now)?;
    if pending.is_empty() {
        writeln!(writer, "Nothing to push.")?;
        return Ok(());
    }

    let user = UserProfile::new(config.user_name.as_deref(), config.user_email.as_deref())
        .map_err(TrackerError::from)
        .context("set user_name and user_email (WT_USER_NAME, WT_USER_EMAIL or config.toml)")?;
    let payload = PushPayload::new(user, &pending);

    if args.dry_run {
        writeln!(writer, "{}", serde_json::to_string_pretty(&payload)?)?;
        return Ok(());
    }

    let endpoint = config
        .push_url
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing push URL (set WT_PUSH_URL or config.toml)"))?;
    let client = Client::new(endpoint, config.push_token.clone().unwrap_or_default())
        .map_err(TrackerError::from)
        .context("failed to create push client")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    runtime
        .block_on(client.push(&payload))
        .map_err(TrackerError::from)
        .context("push failed; records stay unsent")?;

    let marked = tracker
        .mark_sent(&pending.indexes)
        .context("records were pushed but could not be marked as sent")?;
    writeln!(writer, "Pushed {marked} records.")?;
    Ok(())
}
