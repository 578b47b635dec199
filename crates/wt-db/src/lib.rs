//! Storage layer for the work-item timer.
//!
//! Persists the tracker state as two JSON values in a key/value table using
//! `rusqlite`.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE state (key TEXT PRIMARY KEY, value TEXT NOT NULL);
//! ```
//!
//! | key           | value                                  |
//! |---------------|----------------------------------------|
//! | `currentTask` | JSON `ActiveTimer` or `null`           |
//! | `logs`        | JSON array of `LogRecord`              |
//!
//! Both keys are written in one transaction, so a reader never observes a
//! timer from one save next to the log of another. Missing keys load as an
//! empty state.
//!
//! # Thread Safety
//!
//! [`SqliteStore`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Wrap it in a `Mutex` to share it across threads.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use wt_core::{ActiveTimer, LogRecord, StateStore, StoreError, TrackerState};

const CURRENT_TASK_KEY: &str = "currentTask";
const LOGS_KEY: &str = "logs";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored value is not the JSON it should be.
    #[error("corrupt value for key {key}")]
    CorruptValue {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// State could not be encoded for storage.
    #[error("failed to encode {key}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        let message = err.to_string();
        Self::with_source(message, err)
    }
}

/// SQLite-backed [`StateStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens a store at the given path, creating the file and schema if needed.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Opens an in-memory store. Its contents vanish with the connection.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Idempotent schema setup.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Reads the whole state.
    pub fn read_state(&self) -> Result<TrackerState, DbError> {
        let active = self
            .read_key::<Option<ActiveTimer>>(CURRENT_TASK_KEY)?
            .flatten();
        let logs = self
            .read_key::<Vec<LogRecord>>(LOGS_KEY)?
            .unwrap_or_default();
        Ok(TrackerState { active, logs })
    }

    /// Replaces the whole state in a single transaction.
    pub fn write_state(&mut self, state: &TrackerState) -> Result<(), DbError> {
        let active = encode(CURRENT_TASK_KEY, &state.active)?;
        let logs = encode(LOGS_KEY, &state.logs)?;

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            stmt.execute(params![CURRENT_TASK_KEY, active])?;
            stmt.execute(params![LOGS_KEY, logs])?;
        }
        tx.commit()?;
        tracing::debug!(
            running = state.running().is_some(),
            logs = state.logs.len(),
            "saved state"
        );
        Ok(())
    }

    fn read_key<T: DeserializeOwned>(
        &self,
        key: &'static str,
    ) -> Result<Option<T>, DbError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM state WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|source| DbError::CorruptValue { key, source })
        })
        .transpose()
    }
}

impl StateStore for SqliteStore {
    fn load(&self) -> Result<TrackerState, StoreError> {
        Ok(self.read_state()?)
    }

    fn save(&mut self, state: &TrackerState) -> Result<(), StoreError> {
        Ok(self.write_state(state)?)
    }
}

fn encode<T: Serialize>(key: &'static str, value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|source| DbError::Encode { key, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    use wt_core::{TaskRef, Tracker};

    fn sample_state() -> TrackerState {
        TrackerState {
            active: Some(ActiveTimer::new(
                TaskRef::new("9", "Running"),
                "2024-01-01T11:00:00.000Z",
            )),
            logs: vec![
                ActiveTimer::new(TaskRef::new("1", "Done"), "2024-01-01T09:00:00.000Z")
                    .finish("2024-01-01T10:00:00.000Z"),
            ],
        }
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn schema_is_key_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(table_columns(&store.conn, "state"), ["key", "value"]);
        store.init().unwrap();
    }

    #[test]
    fn empty_database_loads_empty_state() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.load().unwrap(), TrackerState::default());
    }

    #[test]
    fn save_then_load_returns_same_state() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let state = sample_state();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);

        let stopped = TrackerState {
            active: None,
            ..state
        };
        store.save(&stopped).unwrap();
        assert_eq!(store.load().unwrap(), stopped);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wt.db");

        let mut store = SqliteStore::open(&path).unwrap();
        store.save(&sample_state()).unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), sample_state());
    }

    #[test]
    fn stored_keys_use_wire_names() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save(&sample_state()).unwrap();

        let logs: String = store
            .conn
            .query_row("SELECT value FROM state WHERE key = 'logs'", [], |row| row.get(0))
            .unwrap();
        let logs: serde_json::Value = serde_json::from_str(&logs).unwrap();
        assert_eq!(logs[0]["startedAt"], "2024-01-01T09:00:00.000Z");
        assert_eq!(logs[0]["sent"], false);
    }

    #[test]
    fn corrupt_value_is_storage_failure() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO state (key, value) VALUES ('logs', 'not json')",
                [],
            )
            .unwrap();

        let err = store.load().unwrap_err();
        assert_eq!(err.message(), "corrupt value for key logs");

        let tracker = Tracker::new(store);
        assert_eq!(tracker.status().unwrap_err().code(), "storage_failure");
    }

    #[test]
    fn legacy_rows_with_loose_fields_still_load() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO state (key, value) VALUES ('logs', ?1)",
                [r#"[{"id": 3, "title": "Old", "captureType": "outros", "startedAt": "2024-01-01T09:00:00Z", "endedAt": "2024-01-01T09:30:00Z"}]"#],
            )
            .unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.logs[0].task.id, "3");
        assert_eq!(state.logs[0].task.capture_type.as_str(), "other");
        assert!(!state.logs[0].sent);
        assert!(state.active.is_none());
    }
}
