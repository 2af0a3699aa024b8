//! End-to-end tests for the `opslog log list` command

use assert_cmd::Command;
use opslog_core::{AuditLogger, AuditRecord, OperationKind};
use predicates::prelude::*;
use serde_json::json;
use std::io::Write;
use tempfile::TempDir;

fn seed_log(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("audit.log");
    let logger = AuditLogger::new(&path, false).unwrap();

    logger
        .append(&AuditRecord::new(
            "alice",
            OperationKind::Write,
            vec!["AAPL".to_string()],
            "my_lib",
            Some(json!({"prune_previous_versions": false})),
        ))
        .unwrap();
    logger
        .append(&AuditRecord::new(
            "bob",
            OperationKind::ReadBatch,
            vec!["AAPL".to_string(), "MSFT".to_string()],
            "my_lib",
            Some(json!({"count": 2})),
        ))
        .unwrap();
    logger
        .append(&AuditRecord::new(
            "alice",
            OperationKind::Delete,
            vec!["MSFT".to_string()],
            "other_lib",
            None,
        ))
        .unwrap();

    path
}

#[test]
fn test_log_list_shows_records() {
    let dir = TempDir::new().unwrap();
    let path = seed_log(&dir);

    let mut cmd = Command::cargo_bin("opslog").unwrap();
    cmd.arg("log").arg("list").arg("--audit-log").arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("bob"))
        .stdout(predicate::str::contains("read_batch"))
        .stdout(predicate::str::contains("AAPL, MSFT"));
}

#[test]
fn test_log_list_filters_by_actor_and_library() {
    let dir = TempDir::new().unwrap();
    let path = seed_log(&dir);

    let mut cmd = Command::cargo_bin("opslog").unwrap();
    cmd.arg("log")
        .arg("list")
        .arg("--audit-log")
        .arg(&path)
        .arg("--actor")
        .arg("alice")
        .arg("--library")
        .arg("my_lib");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1 most recent matching record"))
        .stdout(predicate::str::contains("write"))
        .stdout(predicate::str::contains("bob").not());
}

#[test]
fn test_log_list_reports_malformed_lines() {
    let dir = TempDir::new().unwrap();
    let path = seed_log(&dir);

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap();
    file.write_all(b"garbage that is not json\n").unwrap();

    let mut cmd = Command::cargo_bin("opslog").unwrap();
    cmd.arg("log").arg("list").arg("--audit-log").arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1 malformed line(s) skipped"));
}

#[test]
fn test_log_list_missing_file_is_not_an_error() {
    let dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("opslog").unwrap();
    cmd.arg("log")
        .arg("list")
        .arg("--audit-log")
        .arg(dir.path().join("nope.log"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No audit log found"));
}

#[test]
fn test_log_list_rejects_unknown_operation_filter() {
    let dir = TempDir::new().unwrap();
    let path = seed_log(&dir);

    let mut cmd = Command::cargo_bin("opslog").unwrap();
    cmd.arg("log")
        .arg("list")
        .arg("--audit-log")
        .arg(&path)
        .arg("--operation")
        .arg("drop_table");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unknown operation kind"));
}
