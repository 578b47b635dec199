//! Half-open time intervals and timestamp parsing.
//!
//! Timestamps are persisted as text, so every interval is validated from its
//! raw representation. Accepted inputs:
//! - RFC 3339: `2024-01-01T10:00:00Z`, `2024-01-01T10:00:00.250-03:00`
//! - Naive date-times, taken as UTC: `2024-01-01T10:00:00`, `2024-01-01 10:00:00.250`
//! - Epoch milliseconds written as digits: `1704103200000`

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Why a pair of raw timestamps does not form a valid interval.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidInterval {
    /// One side is not a recognizable instant.
    #[error("{field} is not a valid timestamp: {value:?}")]
    Unparseable { field: &'static str, value: String },

    /// The interval has zero or negative length.
    #[error("interval must end after it starts (startedAt {start}, endedAt {end})")]
    NonPositiveDuration { start: String, end: String },

    /// The interval ends after the current time.
    #[error("endedAt {end} is later than the current time {now}")]
    EndsInFuture { end: String, now: String },
}

/// A validated interval `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeInterval {
    /// Creates an interval, rejecting zero and negative durations.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidInterval> {
        if start >= end {
            return Err(InvalidInterval::NonPositiveDuration {
                start: format_timestamp(start),
                end: format_timestamp(end),
            });
        }
        Ok(Self { start, end })
    }

    /// Parses and validates two raw timestamps.
    pub fn validate(start_raw: &str, end_raw: &str) -> Result<Self, InvalidInterval> {
        let start = parse_field("startedAt", start_raw)?;
        let end = parse_field("endedAt", end_raw)?;
        Self::new(start, end)
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Duration rounded to the nearest whole second (half away from zero).
    #[must_use]
    pub fn rounded_seconds(&self) -> i64 {
        rounded_seconds(self.duration())
    }

    /// Returns true if the two intervals share any instant.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        overlaps(self, other)
    }
}

/// Rounds `duration` to the nearest whole second (half away from zero for
/// non-negative durations).
#[must_use]
pub fn rounded_seconds(duration: Duration) -> i64 {
    (duration.num_milliseconds() + 500).div_euclid(1000)
}

/// Half-open overlap test. Touching endpoints do not overlap.
#[must_use]
pub fn overlaps(a: &TimeInterval, b: &TimeInterval) -> bool {
    a.start < b.end && b.start < a.end
}

/// Parses a single raw timestamp into a UTC instant.
#[must_use]
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Formats an instant the way it is persisted: millisecond RFC 3339 with `Z`.
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_field(field: &'static str, raw: &str) -> Result<DateTime<Utc>, InvalidInterval> {
    parse_instant(raw).ok_or_else(|| InvalidInterval::Unparseable {
        field,
        value: raw.to_string(),
    })
}
