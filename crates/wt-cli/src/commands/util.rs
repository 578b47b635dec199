//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use wt_core::{LogRecord, TaskRef, format_duration, parse_instant};

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(s|sec|second|m|min|minute|h|hour)s?\s+ago$")
        .expect("relative time pattern is valid")
});

/// Conservative bounds for relative time parsing (one week in seconds).
const MAX_RELATIVE_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Parse a datetime string as an absolute timestamp or a relative offset.
///
/// Supports:
/// - Anything [`parse_instant`] accepts: "2026-01-15T10:30:00Z", "2026-01-15 10:30:00"
/// - "now"
/// - Relative: "90 seconds ago", "5 min ago", "2 hours ago", "10m ago"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Some(instant) = parse_instant(s) {
        return Ok(instant);
    }
    if s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '15 minutes ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;
    let seconds_per_unit = match &caps[2] {
        "s" | "sec" | "second" => 1,
        "m" | "min" | "minute" => 60,
        "h" | "hour" => 60 * 60,
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    let seconds = n.saturating_mul(seconds_per_unit);
    if seconds > MAX_RELATIVE_SECONDS {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }
    Ok(now - Duration::seconds(seconds))
}

/// One-line task description: `#id "title" [project]`.
pub fn task_label(task: &TaskRef) -> String {
    let mut label = format!("#{} \"{}\"", task.id, task.title);
    if !task.project_name.is_empty() {
        label.push_str(&format!(" [{}]", task.project_name));
    }
    label
}

/// `HH:MM:SS` for a stored record, or `--:--:--` when its interval is invalid.
pub fn record_duration(record: &LogRecord) -> String {
    record.interval().map_or_else(
        |_| "--:--:--".to_string(),
        |interval| format_duration(interval.rounded_seconds()),
    )
}
