//! End-to-end CLI tests for the sigmirror binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use sigmirror_core::lock::RunLock;
use tempfile::TempDir;

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("sigmirror").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mirror ClamAV signature databases"))
        .stdout(predicate::str::contains("--text-record"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("sigmirror").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sigmirror"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("sigmirror").unwrap();
    cmd.arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that out-of-range retry counts are rejected by the parser.
#[test]
fn test_binary_max_attempts_out_of_range_rejected() {
    let mut cmd = Command::cargo_bin("sigmirror").unwrap();
    cmd.args(["--max-attempts", "11"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("11"));
}

/// Test that an unusable artifact name exits with the configuration code.
#[test]
fn test_binary_invalid_artifact_name_exits_2() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("sigmirror").unwrap();
    cmd.args(["--artifact", "../etc/passwd", "-l"])
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid artifact name"));
}

/// Test that a fallback mirror given as a URL is refused before any download.
#[test]
fn test_binary_fallback_mirror_url_exits_2() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("sigmirror").unwrap();
    cmd.args(["--fallback-mirror", "http://mirror.example.org", "-l"])
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid fallback mirror"));
}

/// Test that a held lock makes the binary exit with 254 without creating the mirror.
#[test]
fn test_binary_exits_254_when_lock_held() {
    // The system resolver is configured before the lock is taken.
    if !Path::new("/etc/resolv.conf").exists() {
        eprintln!("[lock-test] /etc/resolv.conf missing; skipping");
        return;
    }

    let dir = TempDir::new().unwrap();
    let lock_dir = dir.path().join("lock");
    let _held = RunLock::acquire(&lock_dir).unwrap();

    let mut cmd = Command::cargo_bin("sigmirror").unwrap();
    cmd.arg("-l")
        .arg(&lock_dir)
        .arg("-w")
        .arg(dir.path().join("work"))
        .arg("-d")
        .arg(dir.path().join("mirror"))
        .assert()
        .code(254)
        .stderr(predicate::str::contains("already running"));

    assert!(!dir.path().join("mirror").exists());
}
