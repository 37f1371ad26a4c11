// The cargo_bin! macro requires build script setup that's overkill for simple tests.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_help_flag() {
    let mut cmd = Command::new(cargo_bin("transim"));
    let output = cmd.arg("--help").output().expect("failed to execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--ticks"));
    assert!(stdout.contains("--config"));
}

#[test]
fn test_run_prints_checksums() {
    AssertCommand::new(cargo_bin("transim"))
        .args(["--ticks", "150", "--log-level", "warn"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tick 0 checksum"))
        .stdout(predicate::str::contains("tick 148 checksum"));
}

#[test]
fn test_runs_are_reproducible() {
    let run = || {
        Command::new(cargo_bin("transim"))
            .args(["--ticks", "200", "--log-level", "error"])
            .output()
            .expect("failed to execute")
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn test_missing_config_fails() {
    let output = Command::new(cargo_bin("transim"))
        .args(["--config", "/nonexistent/transim.json", "-t", "1"])
        .output()
        .expect("failed to execute process");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nonexistent"), "Stderr: {}", stderr);
}

#[test]
fn test_small_map_is_rejected() {
    AssertCommand::new(cargo_bin("transim"))
        .args(["--width", "8", "--height", "8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least"));
}
