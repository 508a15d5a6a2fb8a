//! End-to-end tests for the sync-cli binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn sync_cli(data_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("sync-cli").unwrap();
    cmd.arg("--data-dir").arg(data_dir);
    cmd
}

#[test]
fn offline_enqueue_then_status_shows_pending() {
    let dir = tempdir().unwrap();

    sync_cli(dir.path())
        .args(["enqueue", "--type", "progress", "--endpoint", "/progress"])
        .args(["--payload", r#"{"lesson": 3}"#, "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued progress item"))
        .stdout(predicate::str::contains("deferred (offline)"));

    sync_cli(dir.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""pendingItems": 1"#))
        .stdout(predicate::str::contains(r#""backend": "structured""#));
}

#[test]
fn offline_drain_attempts_nothing() {
    let dir = tempdir().unwrap();

    sync_cli(dir.path())
        .args(["drain", "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Offline: nothing attempted"));
}

#[test]
fn clear_reports_dropped_items() {
    let dir = tempdir().unwrap();

    for badge in ["first-lesson", "streak-7"] {
        sync_cli(dir.path())
            .args(["enqueue", "-t", "achievement", "-e", "/achievements", "--offline"])
            .args(["--payload", &format!(r#"{{"badge": "{}"}}"#, badge)])
            .assert()
            .success();
    }

    sync_cli(dir.path())
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 2 queued item(s)"));
}

#[test]
fn payload_from_file() {
    let dir = tempdir().unwrap();
    let payload = dir.path().join("settings.json");
    std::fs::write(&payload, r#"{"theme": "dark"}"#).unwrap();

    sync_cli(dir.path())
        .args(["enqueue", "--type", "settings", "--endpoint", "/settings", "--offline"])
        .arg("--file")
        .arg(&payload)
        .assert()
        .success();
}

#[test]
fn unknown_item_type_is_rejected() {
    let dir = tempdir().unwrap();

    sync_cli(dir.path())
        .args(["enqueue", "--type", "badges", "--endpoint", "/x", "--payload", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown item type"));
}

#[test]
fn invalid_payload_is_rejected() {
    let dir = tempdir().unwrap();

    sync_cli(dir.path())
        .args(["enqueue", "--type", "progress", "--endpoint", "/p", "--payload", "{nope"])
        .arg("--offline")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Payload is not valid JSON"));
}

#[test]
fn invalid_config_fails() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("offline-sync.toml"),
        "[store]\nbackend = \"indexeddb\"\n",
    )
    .unwrap();

    sync_cli(dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn blob_backend_from_config() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("offline-sync.toml"),
        "[store]\nbackend = \"blob\"\n",
    )
    .unwrap();

    sync_cli(dir.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""backend": "blob""#));
}
