//! Core domain logic for the work-item timer.
//!
//! This crate contains the fundamental types and logic for:
//! - Intervals: parsing timestamps and testing half-open overlap
//! - Timer: the single running timer and its conversion into log records
//! - Reconciliation: all-or-nothing import of externally supplied records
//! - Projection: flattened export rows for CSV, JSON and remote push
//! - Protocol: the request/response message surface over a [`Tracker`]

mod error;
pub mod export;
pub mod interval;
pub mod projection;
pub mod protocol;
pub mod reconcile;
pub mod record;
pub mod task;
pub mod timer;
mod tracker;

pub use error::{StoreError, TrackerError};
pub use interval::{
    InvalidInterval, TimeInterval, format_timestamp, overlaps, parse_instant, rounded_seconds,
};
pub use projection::{ExportData, ExportOptions, ExportRow, PendingPush, format_duration};
pub use reconcile::RawRow;
pub use record::{ActiveTimer, LogRecord, TrackerState};
pub use task::{CaptureType, TaskRef};
pub use timer::TimerAction;
pub use tracker::{MemoryStore, StateStore, Tracker};
