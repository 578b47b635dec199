//! JSON request/response surface over a [`Tracker`].
//!
//! Each request is a JSON object tagged by `type`. Each response is a JSON
//! object with a boolean `ok`; failures carry a readable `error` and a stable
//! `code` instead of escaping to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::TrackerError;
use crate::export::render_csv;
use crate::projection::ExportOptions;
use crate::reconcile::RawRow;
use crate::task::TaskRef;
use crate::tracker::{StateStore, Tracker};

/// A single message to the tracker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    StartOrStopForItem {
        item: TaskRef,
    },
    GetStatus,
    ClearLogs,
    GetExportData {
        #[serde(default)]
        options: ExportOptions,
    },
    ExportCsv {
        #[serde(default)]
        options: ExportOptions,
    },
    ImportLogs {
        rows: Vec<RawRow>,
    },
    GetPendingLogsForExternalPush,
    /// Entries that are not valid log indexes are skipped.
    MarkLogsAsSent {
        indexes: Vec<Value>,
    },
}

/// Parses and handles one raw JSON message at the current time.
pub fn handle_message<S: StateStore>(tracker: &mut Tracker<S>, raw: &str) -> Value {
    handle_message_at(tracker, raw, Utc::now())
}

/// Parses and handles one raw JSON message at `now`.
pub fn handle_message_at<S: StateStore>(
    tracker: &mut Tracker<S>,
    raw: &str,
    now: DateTime<Utc>,
) -> Value {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => return invalid_request(&format!("malformed JSON: {err}")),
    };

    let Some(kind) = value.get("type").and_then(Value::as_str).map(str::to_owned) else {
        return invalid_request("message has no \"type\"");
    };

    match serde_json::from_value::<Request>(value) {
        Ok(request) => handle_at(tracker, request, now),
        Err(err) if err.to_string().starts_with("unknown variant") => {
            tracing::debug!(kind = %kind, "unknown message type");
            failure("unknown_message", &format!("unknown message type {kind:?}"))
        }
        Err(err) => invalid_request(&format!("invalid {kind} message: {err}")),
    }
}

/// Handles a parsed request at `now`.
pub fn handle_at<S: StateStore>(
    tracker: &mut Tracker<S>,
    request: Request,
    now: DateTime<Utc>,
) -> Value {
    match dispatch(tracker, request, now) {
        Ok(body) => success(body),
        Err(err) => {
            tracing::debug!(code = err.code(), error = %err, "request failed");
            failure(err.code(), &err.to_string())
        }
    }
}

fn dispatch<S: StateStore>(
    tracker: &mut Tracker<S>,
    request: Request,
    now: DateTime<Utc>,
) -> Result<Value, TrackerError> {
    match request {
        Request::StartOrStopForItem { item } => to_body(&tracker.start_or_stop_at(item, now)?),
        Request::GetStatus => to_body(&tracker.status()?),
        Request::ClearLogs => Ok(json!({ "cleared": tracker.clear_logs()? })),
        Request::GetExportData { options } => to_body(&tracker.export_data_at(options, now)?),
        Request::ExportCsv { options } => {
            let data = tracker.export_data_at(options, now)?;
            let csv = render_csv(&data.rows).map_err(|err| TrackerError::InvalidRequest {
                reason: format!("failed to render CSV: {err}"),
            })?;
            Ok(json!({ "csv": csv, "exportedAt": data.exported_at }))
        }
        Request::ImportLogs { rows } => Ok(json!({ "count": tracker.import_logs_at(&rows, now)? })),
        Request::GetPendingLogsForExternalPush => to_body(&tracker.pending_for_push_at(now)?),
        Request::MarkLogsAsSent { indexes } => {
            Ok(json!({ "marked": tracker.mark_sent(&log_indexes(&indexes))? }))
        }
    }
}

/// Keeps the non-negative integer indexes and logs the rest.
fn log_indexes(raw: &[Value]) -> Vec<usize> {
    raw.iter()
        .filter_map(|value| {
            let index = value.as_u64().and_then(|index| usize::try_from(index).ok());
            if index.is_none() {
                tracing::warn!(index = %value, "skipping invalid log index");
            }
            index
        })
        .collect()
}

fn to_body<T: Serialize>(body: &T) -> Result<Value, TrackerError> {
    serde_json::to_value(body).map_err(|err| TrackerError::InvalidRequest {
        reason: format!("failed to encode response: {err}"),
    })
}

fn success(body: Value) -> Value {
    let mut object = match body {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        other => {
            let mut object = Map::new();
            object.insert("result".to_string(), other);
            object
        }
    };
    object.insert("ok".to_string(), Value::Bool(true));
    Value::Object(object)
}

fn failure(code: &str, error: &str) -> Value {
    json!({ "ok": false, "code": code, "error": error })
}

fn invalid_request(error: &str) -> Value {
    failure("invalid_request", error)
}
