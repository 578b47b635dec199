//! Message command: one JSON request in, one JSON response out.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use wt_core::protocol::handle_message_at;
use wt_core::{StateStore, Tracker};

/// Handles `input` and prints the response on a single line.
///
/// Request failures are part of the response, so this only errors when the
/// response cannot be written.
pub fn run<W: Write, S: StateStore>(
    writer: &mut W,
    tracker: &mut Tracker<S>,
    input: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let response = handle_message_at(tracker, input, now);
    writeln!(writer, "{response}")?;
    Ok(())
}
