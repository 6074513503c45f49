//! Integration tests for the mail commands

use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".git")).unwrap();
    temp_dir
}

fn acb(temp_dir: &TempDir, identity: &str) -> assert_cmd::Command {
    let mut cmd = cargo::cargo_bin_cmd!("acb");
    cmd.env("ACB_HOME", temp_dir.path())
        .env("ACB_IDENTITY", identity)
        .env("ACB_LOG", "error")
        .env_remove("ACB_ROOT")
        .env_remove("ACB_BOARD")
        .current_dir(temp_dir.path());
    cmd
}

fn json_output(cmd: &mut assert_cmd::Command) -> serde_json::Value {
    let output = cmd.arg("--json").output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_send_poll_ack() {
    let temp_dir = setup();

    let sent = json_output(acb(&temp_dir, "Agent-1").args([
        "mail",
        "send",
        "Agent-2",
        "handoff",
        "please take t1",
        "--type",
        "task",
    ]));
    let id = sent["messageId"].as_str().unwrap().to_string();

    let inbox = json_output(acb(&temp_dir, "Agent-2").args(["mail", "poll"]));
    let messages = inbox.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["messageId"], id.as_str());
    assert_eq!(messages[0]["senderId"], "Agent-1");
    assert_eq!(messages[0]["type"], "task");
    assert_eq!(messages[0]["body"], "please take t1");

    // Polling does not consume
    let again = json_output(acb(&temp_dir, "Agent-2").args(["mail", "poll"]));
    assert_eq!(again.as_array().unwrap().len(), 1);

    acb(&temp_dir, "Agent-2")
        .args(["mail", "ack", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acknowledged"));

    acb(&temp_dir, "Agent-2")
        .args(["mail", "ack", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("already handled"));

    acb(&temp_dir, "Agent-2")
        .args(["mail", "poll"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No messages"));
}

#[test]
fn test_structured_body_and_limit() {
    let temp_dir = setup();
    for i in 0..3 {
        acb(&temp_dir, "Agent-1")
            .args([
                "mail",
                "send",
                "Agent-2",
                &format!("status {i}"),
                &format!("{{\"progress\": {i}}}"),
                "--json-body",
            ])
            .assert()
            .success();
    }

    let limited = json_output(acb(&temp_dir, "Agent-2").args(["mail", "poll", "--limit", "2"]));
    let messages = limited.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[0]["body"]["progress"].is_number());
}

#[test]
fn test_invalid_json_body_is_rejected() {
    let temp_dir = setup();
    acb(&temp_dir, "Agent-1")
        .args(["mail", "send", "Agent-2", "oops", "{not json", "--json-body"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn test_malformed_inbox_file_is_quarantined() {
    let temp_dir = setup();
    let inbox = temp_dir.path().join(".acb/mail/Agent-2/inbox");
    fs::create_dir_all(&inbox).unwrap();
    fs::write(inbox.join("00000000000000000001_broken.json"), "{{{{").unwrap();

    acb(&temp_dir, "Agent-2")
        .args(["mail", "poll"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No messages"));

    let status = json_output(acb(&temp_dir, "Agent-2").args(["mail", "status"]));
    assert_eq!(status["pending"], 0);
    assert_eq!(status["error"], 1);
    assert!(temp_dir
        .path()
        .join(".acb/mail/Agent-2/error/00000000000000000001_broken.json.note")
        .exists());
}

#[test]
fn test_failed_ack_moves_to_error() {
    let temp_dir = setup();
    let sent = json_output(acb(&temp_dir, "Agent-1").args(["mail", "send", "Agent-2", "job", "x"]));
    let id = sent["messageId"].as_str().unwrap().to_string();

    let acked = json_output(acb(&temp_dir, "Agent-2").args(["mail", "ack", &id, "--failed"]));
    assert_eq!(acked["moved"], true);

    let status = json_output(acb(&temp_dir, "Agent-2").args(["mail", "status"]));
    assert_eq!(status["error"], 1);
}

#[test]
fn test_path_like_recipient_is_rejected() {
    let temp_dir = setup();
    acb(&temp_dir, "Agent-1")
        .args(["mail", "send", "../escape", "s", "b"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_stray_inbox_files_are_reported() {
    let temp_dir = setup();
    let inbox = temp_dir.path().join(".acb/mail/Agent-2/inbox");
    fs::create_dir_all(&inbox).unwrap();
    fs::write(inbox.join("garbage"), "{ not json").unwrap();

    acb(&temp_dir, "Agent-2").args(["mail", "poll"]).assert().success();
    fs::write(inbox.join("garbage"), "{ again").unwrap();
    acb(&temp_dir, "Agent-2").args(["mail", "poll"]).assert().success();

    let status = json_output(acb(&temp_dir, "Agent-2").args(["mail", "status"]));
    assert_eq!(status["pending"], 0);
    assert_eq!(status["error"], 2);
}
