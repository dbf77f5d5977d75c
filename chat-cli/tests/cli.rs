//! Process-level checks of the `huddle` binary. None of these reach a
//! backend.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn huddle() -> Command {
    let mut cmd = Command::cargo_bin("huddle").unwrap();
    cmd.env_remove("HUDDLE_TOKEN").env("RUST_LOG", "off");
    cmd
}

#[test]
fn help_lists_commands() {
    huddle()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("ensure-group"));
}

#[test]
fn init_writes_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("huddle.toml");

    huddle()
        .args(["--config", path.to_str().unwrap(), "init", "--user", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"));

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("user_id = \"alice\""));
}

#[test]
fn missing_explicit_config_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    huddle()
        .args(["--config", path.to_str().unwrap(), "history", "--group", "g1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn commands_require_identity() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("huddle.toml");
    std::fs::write(&path, "[server]\nhttp_base_url = \"http://127.0.0.1:9\"\n").unwrap();

    huddle()
        .args(["--config", path.to_str().unwrap(), "members", "list", "--group", "g1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("identity.user_id is not set"));
}

#[test]
fn history_needs_a_target() {
    huddle().arg("history").assert().failure();
}
