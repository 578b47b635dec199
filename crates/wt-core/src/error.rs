//! Error taxonomy for tracker operations.

use thiserror::Error;

use crate::interval::InvalidInterval;
use crate::record::LogRecord;

/// Errors returned by tracker operations.
///
/// Every operation is atomic: when one of these is returned, the persisted
/// state is exactly what it was before the call.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// An import row does not describe a valid interval.
    #[error("row {row}: {source}")]
    InvalidInterval {
        /// 1-based position of the row in the submitted batch.
        row: usize,
        #[source]
        source: InvalidInterval,
    },

    /// The running timer cannot be stopped at the requested end.
    #[error("cannot stop timer: {source}")]
    InvalidStop {
        #[source]
        source: InvalidInterval,
    },

    /// Two rows of the same import batch overlap each other.
    #[error("imported rows overlap each other: {} and {}", describe(.first), describe(.second))]
    InternalConflict {
        first: Box<LogRecord>,
        second: Box<LogRecord>,
    },

    /// An import row overlaps a stored record or the running timer.
    #[error("{} overlaps existing record {}", describe(.candidate), describe(.conflicting))]
    ExternalConflict {
        candidate: Box<LogRecord>,
        conflicting: Box<LogRecord>,
    },

    /// The import batch had no usable rows.
    #[error("nothing to import: the batch has no rows")]
    EmptyBatch,

    /// The request itself is malformed (e.g. a task without an id).
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Persisting or loading state failed.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Pushing records to the remote work-log service failed.
    #[error("remote push failed: {message}")]
    Remote { message: String },
}

impl TrackerError {
    /// Stable machine-readable code for the message protocol.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInterval { .. } | Self::InvalidStop { .. } => "invalid_interval",
            Self::InternalConflict { .. } => "internal_conflict",
            Self::ExternalConflict { .. } => "external_conflict",
            Self::EmptyBatch => "empty_batch",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Storage(_) => "storage_failure",
            Self::Remote { .. } => "remote_failure",
        }
    }
}

/// Failure of the persistence layer behind a [`crate::StateStore`].
#[derive(Debug, Error)]
#[error("storage failure: {message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

fn describe(record: &LogRecord) -> String {
    format!(
        "#{} \"{}\" ({} .. {})",
        record.task.id, record.task.title, record.started_at, record.ended_at
    )
}
