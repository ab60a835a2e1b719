//! Tests of the `qrun` binary that do not need a browser.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn qrun() -> Command {
    let mut cmd = Command::cargo_bin("qrun").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_job_options() {
    qrun()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--parallel"))
        .stdout(predicate::str::contains("--fail-fast"))
        .stdout(predicate::str::contains("--global-timeout"));
}

#[test]
fn test_version() {
    qrun()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_duration_is_rejected() {
    qrun()
        .args(["--page-timeout", "soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--page-timeout"));
}

#[test]
fn test_cache_conflicts_with_no_cache() {
    qrun()
        .args(["--cache", ".ui5", "--no-cache"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_zero_parallel_fails_before_serving() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("webapp")).unwrap();

    qrun()
        .arg("--cwd")
        .arg(temp.path())
        .args(["--parallel", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parallel"));
}

#[test]
fn test_missing_webapp_fails() {
    let temp = TempDir::new().unwrap();

    qrun()
        .arg("--cwd")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("webapp"));
}
