//! Integration tests for the ucimatch binary
//!
//! Runs the real executable against scripted engines written to a temp dir.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

// ============================================================================
// TEST FIXTURES
// ============================================================================

const GOOD_ENGINE: &str = r#"#!/bin/sh
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "id name Good"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go) echo "info depth 1 score cp 7 pv e2e4"; echo "bestmove e2e4" ;;
    quit) exit 0 ;;
  esac
done
"#;

const SCORELESS_ENGINE: &str = r#"#!/bin/sh
while read -r cmd rest; do
  case "$cmd" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    go) echo "info depth 1 nodes 1"; echo "bestmove e2e4" ;;
    quit) exit 0 ;;
  esac
done
"#;

fn write_engine(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn ucimatch() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ucimatch"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn test_compliance_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_engine(dir.path(), "good.sh", GOOD_ENGINE);
    let bad = write_engine(dir.path(), "bad.sh", SCORELESS_ENGINE);

    let output = ucimatch().arg("--compliance").arg(&good).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Step 1:"));
    assert!(stdout.contains("Step 9:"));

    let output = ucimatch().arg("--compliance").arg(&bad).output().unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Step 6:"));
    assert!(!stdout.contains("Step 7:"));

    let missing = dir.path().join("missing");
    let output = ucimatch().arg("--compliance").arg(&missing).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_tournament_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let engine = write_engine(dir.path(), "good.sh", GOOD_ENGINE);
    let records = dir.path().join("games.jsonl");
    let state = dir.path().join("state.json");

    let output = ucimatch()
        .arg("--engine")
        .arg(format!("cmd={} name=alpha", engine.display()))
        .arg("--engine")
        .arg(format!("cmd={} name=beta", engine.display()))
        .args(["--each", "depth=1", "--rounds", "2", "--concurrency", "2"])
        .args(["--max-moves", "3", "--json"])
        .arg("--records")
        .arg(&records)
        .arg("--state")
        .arg(&state)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["completed"], 4);
    assert_eq!(report["standings"].as_array().unwrap().len(), 2);
    assert_eq!(fs::read_to_string(&records).unwrap().lines().count(), 4);
    assert!(state.exists());

    // resuming a finished run plays nothing more
    let output = ucimatch()
        .arg("--engine")
        .arg(format!("cmd={} name=alpha", engine.display()))
        .arg("--engine")
        .arg(format!("cmd={} name=beta", engine.display()))
        .args(["--each", "depth=1", "--rounds", "2", "--json", "--resume"])
        .arg("--state")
        .arg(&state)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["completed"], 4);
}

#[test]
fn test_setup_errors_exit_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let engine = write_engine(dir.path(), "good.sh", GOOD_ENGINE);

    // single engine
    let output = ucimatch()
        .arg("--engine")
        .arg(format!("cmd={} depth=1", engine.display()))
        .output()
        .unwrap();
    assert!(!output.status.success());

    // unclocked engine without depth or nodes
    let output = ucimatch()
        .arg("--engine")
        .arg(format!("cmd={} name=a", engine.display()))
        .arg("--engine")
        .arg(format!("cmd={} name=b depth=1", engine.display()))
        .output()
        .unwrap();
    assert!(!output.status.success());

    // engine path that does not exist
    let output = ucimatch()
        .arg("--engine")
        .arg("cmd=/no/such/engine name=a depth=1")
        .arg("--engine")
        .arg(format!("cmd={} name=b depth=1", engine.display()))
        .output()
        .unwrap();
    assert!(!output.status.success());

    // malformed time control
    let output = ucimatch()
        .arg("--engine")
        .arg(format!("cmd={} name=a tc=fast", engine.display()))
        .arg("--engine")
        .arg(format!("cmd={} name=b depth=1", engine.display()))
        .output()
        .unwrap();
    assert!(!output.status.success());
}
