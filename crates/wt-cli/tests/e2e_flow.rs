//! End-to-end tests driving the `wt` binary.
//!
//! Each test runs against its own temporary home directory and database.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

fn wt_binary() -> String {
    env!("CARGO_BIN_EXE_wt").to_string()
}

fn db_path(temp: &Path) -> PathBuf {
    temp.join("data").join("wt.db")
}

fn wt(temp: &Path) -> Command {
    let mut cmd = Command::new(wt_binary());
    cmd.env("HOME", temp)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_DATA_HOME")
        .env_remove("WT_PUSH_URL")
        .env_remove("WT_PUSH_TOKEN")
        .env_remove("WT_USER_NAME")
        .env_remove("WT_USER_EMAIL")
        .env_remove("WT_MIN_EXPORT_SECONDS")
        .env("WT_DATABASE_PATH", db_path(temp));
    cmd
}

fn run_ok(cmd: &mut Command) -> String {
    let output = cmd.output().expect("failed to run wt");
    assert!(
        output.status.success(),
        "wt should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

fn run_with_stdin(cmd: &mut Command, input: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn wt");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn test_toggle_status_export_flow() {
    let temp = TempDir::new().unwrap();

    let started = run_ok(wt(temp.path()).args(["toggle", "42", "--title", "Fix login"]));
    assert!(started.starts_with("Started #42 \"Fix login\" at "));
    assert!(db_path(temp.path()).exists());

    let status = run_ok(wt(temp.path()).arg("status"));
    assert!(status.starts_with("Running: #42 \"Fix login\""));
    assert!(status.contains("No records."));

    // Keep every recorded interval longer than the millisecond timestamp resolution.
    thread::sleep(Duration::from_millis(20));
    let switched = run_ok(wt(temp.path()).args(["toggle", "43", "--title", "Review"]));
    assert!(switched.starts_with("Started #43"));

    thread::sleep(Duration::from_millis(20));
    let stopped = run_ok(wt(temp.path()).arg("stop"));
    assert!(stopped.starts_with("Stopped #43 \"Review\" after "));

    let csv = run_ok(wt(temp.path()).args(["export", "--format", "csv"]));
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "id,title,projectName,captureType,startedAt,endedAt,durationSeconds,url"
    );
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("42,Fix login,"));
    assert!(lines[2].starts_with("43,Review,"));
}

#[test]
fn test_conflicting_import_is_rejected_whole() {
    let temp = TempDir::new().unwrap();
    let rows = temp.path().join("rows.json");
    std::fs::write(
        &rows,
        r#"[{"id": "1", "title": "Morning", "startedAt": "2024-03-01T09:00:00Z", "endedAt": "2024-03-01T10:00:00Z"}]"#,
    )
    .unwrap();
    let imported = run_ok(wt(temp.path()).arg("import").arg(&rows));
    assert_eq!(imported, "Imported 1 records.\n");

    let overlapping = run_with_stdin(
        wt(temp.path()).arg("import"),
        r#"[
            {"id": "2", "startedAt": "2024-03-01T07:00:00Z", "endedAt": "2024-03-01T08:00:00Z"},
            {"id": "3", "startedAt": "2024-03-01T09:30:00Z", "endedAt": "2024-03-01T11:00:00Z"}
        ]"#,
    );
    assert!(!overlapping.status.success());
    let stderr = String::from_utf8_lossy(&overlapping.stderr);
    assert!(stderr.contains("overlaps existing record #1"), "stderr: {stderr}");

    let state = run_ok(wt(temp.path()).args(["status", "--json"]));
    let state: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert_eq!(state["logs"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_message_channel() {
    let temp = TempDir::new().unwrap();

    let output = run_with_stdin(
        wt(temp.path()).arg("message"),
        r#"{"type": "startOrStopForItem", "item": {"id": 7, "title": "Call"}}"#,
    );
    assert!(output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["ok"], true);
    assert_eq!(response["action"], "started");

    let output = run_with_stdin(wt(temp.path()).arg("message"), r#"{"type": "getStatus"}"#);
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["currentTask"]["id"], "7");

    let output = run_with_stdin(wt(temp.path()).arg("message"), "not json");
    assert!(output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["ok"], false);
    assert_eq!(response["code"], "invalid_request");
}

#[test]
fn test_config_file_sets_database_path() {
    let temp = TempDir::new().unwrap();
    let custom_db = temp.path().join("custom").join("state.db");
    let config = temp.path().join("wt.toml");
    std::fs::write(
        &config,
        format!("database_path = {:?}\n", custom_db.display().to_string()),
    )
    .unwrap();

    let mut cmd = wt(temp.path());
    cmd.env_remove("WT_DATABASE_PATH")
        .arg("--config")
        .arg(&config)
        .args(["toggle", "1"]);
    run_ok(&mut cmd);

    assert!(custom_db.exists());
    assert!(!db_path(temp.path()).exists());
}

#[test]
fn test_push_without_pending_records() {
    let temp = TempDir::new().unwrap();
    let output = run_ok(wt(temp.path()).arg("push"));
    assert_eq!(output, "Nothing to push.\n");
}
