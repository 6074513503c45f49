//! Integration tests for the task commands

use agent_coord_core::io::acquire_lock;
use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

/// Isolated workspace: `ACB_HOME` points at the temp dir, and a `.git`
/// marker stops the repo config search from leaving it.
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
        .env_remove("ACB_LOCK_TIMEOUT_MS")
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

fn add_task(temp_dir: &TempDir, id: &str, title: &str) {
    acb(temp_dir, "planner")
        .args(["task", "add", title, "--id", id])
        .assert()
        .success();
}

#[test]
fn test_add_and_get() {
    let temp_dir = setup();
    let added = json_output(acb(&temp_dir, "planner").args([
        "task",
        "add",
        "Write release notes",
        "--priority",
        "high",
        "--requires",
        "docs",
        "--field",
        "estimate=3",
    ]));
    assert_eq!(added["status"], "PENDING");
    assert_eq!(added["priority"], "high");
    assert_eq!(added["estimate"], 3);
    let id = added["id"].as_str().unwrap().to_string();

    let fetched = json_output(acb(&temp_dir, "planner").args(["task", "get", &id]));
    assert_eq!(fetched["title"], "Write release notes");
    assert_eq!(fetched["requiredCapabilities"][0], "docs");

    let board = temp_dir.path().join(".acb/boards/main.json");
    assert!(board.exists());
}

#[test]
fn test_duplicate_id_is_rejected() {
    let temp_dir = setup();
    add_task(&temp_dir, "t1", "first");

    acb(&temp_dir, "planner")
        .args(["task", "add", "second", "--id", "t1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_claim_is_exclusive() {
    let temp_dir = setup();
    add_task(&temp_dir, "t1", "contested");

    let claimed = json_output(acb(&temp_dir, "w1").args(["task", "claim", "t1"]));
    assert_eq!(claimed["status"], "CLAIMED");
    assert_eq!(claimed["assignee"], "w1");

    acb(&temp_dir, "w2")
        .args(["task", "claim", "t1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot claim task 't1'"));
}

#[test]
fn test_next_without_tasks_is_not_an_error() {
    let temp_dir = setup();

    acb(&temp_dir, "w1")
        .args(["task", "next"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No eligible task"));

    let none = json_output(acb(&temp_dir, "w1").args(["task", "next"]));
    assert!(none.is_null());
}

#[test]
fn test_next_respects_priority_and_capabilities() {
    let temp_dir = setup();
    acb(&temp_dir, "planner")
        .args(["task", "add", "routine", "--id", "low", "--priority", "low"])
        .assert()
        .success();
    acb(&temp_dir, "planner")
        .args(["task", "add", "urgent", "--id", "gpu", "--priority", "critical", "--requires", "gpu"])
        .assert()
        .success();

    let first = json_output(acb(&temp_dir, "w1").args(["task", "next", "--capability", "rust"]));
    assert_eq!(first["id"], "low");

    let second = json_output(acb(&temp_dir, "w2").args(["task", "next", "--capability", "gpu"]));
    assert_eq!(second["id"], "gpu");
}

#[test]
fn test_next_reports_lock_contention() {
    let temp_dir = setup();
    add_task(&temp_dir, "t1", "waiting");

    let lock_path = temp_dir.path().join(".acb/boards/main.json.lock");
    let _held = acquire_lock(&lock_path, Duration::from_secs(1)).unwrap();

    acb(&temp_dir, "w1")
        .args(["task", "next", "--lock-timeout-ms", "100"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to acquire lock"));
}

#[test]
fn test_full_lifecycle_and_archive() {
    let temp_dir = setup();
    add_task(&temp_dir, "t1", "ship it");

    acb(&temp_dir, "w1").args(["task", "claim", "t1"]).assert().success();

    let submitted = json_output(acb(&temp_dir, "w1").args(["task", "submit", "t1", "--summary", "merged"]));
    assert_eq!(submitted["status"], "COMPLETED_PENDING_REVIEW");
    assert_eq!(submitted["resultSummary"], "merged");

    let finalized = json_output(acb(&temp_dir, "reviewer").args([
        "task",
        "finalize",
        "t1",
        "--outcome",
        "success",
    ]));
    assert_eq!(finalized["status"], "COMPLETED");
    assert!(finalized["completed_at"].is_string());

    let archived = json_output(acb(&temp_dir, "w1").args(["task", "archive"]));
    assert_eq!(archived.as_array().unwrap().len(), 1);

    acb(&temp_dir, "w1")
        .args(["task", "get", "t1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
    let archive_log = fs::read_to_string(temp_dir.path().join(".acb/boards/main.archive.jsonl")).unwrap();
    assert_eq!(archive_log.lines().count(), 1);
}

#[test]
fn test_fail_then_reject() {
    let temp_dir = setup();
    add_task(&temp_dir, "t1", "flaky");
    acb(&temp_dir, "w1").args(["task", "claim", "t1"]).assert().success();
    acb(&temp_dir, "w1").args(["task", "start", "t1"]).assert().success();

    let failed = json_output(acb(&temp_dir, "w1").args(["task", "fail", "t1", "--details", "OOM"]));
    assert_eq!(failed["status"], "COMPLETED_PENDING_REVIEW");
    assert_eq!(failed["errorDetails"], "OOM");

    let rejected = json_output(acb(&temp_dir, "reviewer").args([
        "task", "finalize", "t1", "--outcome", "failure",
    ]));
    assert_eq!(rejected["status"], "FAILED");
}

#[test]
fn test_block_and_unblock() {
    let temp_dir = setup();
    add_task(&temp_dir, "t1", "needs creds");
    acb(&temp_dir, "w1").args(["task", "claim", "t1"]).assert().success();
    acb(&temp_dir, "w1").args(["task", "start", "t1"]).assert().success();

    let blocked = json_output(acb(&temp_dir, "w1").args(["task", "block", "t1", "--reason", "no token"]));
    assert_eq!(blocked["status"], "BLOCKED");
    assert_eq!(blocked["blockedFrom"], "WORKING");

    let resumed = json_output(acb(&temp_dir, "w1").args(["task", "unblock", "t1"]));
    assert_eq!(resumed["status"], "WORKING");
    assert!(resumed.get("blockedReason").is_none_or(|v| v.is_null()));
}

#[test]
fn test_invalid_transition_leaves_board_untouched() {
    let temp_dir = setup();
    add_task(&temp_dir, "t1", "not yet claimed");
    let board = temp_dir.path().join(".acb/boards/main.json");
    let before = fs::read(&board).unwrap();

    acb(&temp_dir, "w1")
        .args(["task", "start", "t1"])
        .assert()
        .failure()
        .code(1);

    assert_eq!(fs::read(&board).unwrap(), before);
}

#[test]
fn test_list_filters_and_update() {
    let temp_dir = setup();
    add_task(&temp_dir, "a", "alpha");
    add_task(&temp_dir, "b", "beta");
    acb(&temp_dir, "w1").args(["task", "claim", "a"]).assert().success();

    let pending = json_output(acb(&temp_dir, "w1").args(["task", "list", "--status", "PENDING"]));
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["id"], "b");

    let mine = json_output(acb(&temp_dir, "w1").args(["task", "list", "--mine"]));
    assert_eq!(mine[0]["id"], "a");

    let updated = json_output(acb(&temp_dir, "planner").args([
        "task", "update", "b", "--title", "beta v2", "--field", "team=infra",
    ]));
    assert_eq!(updated["title"], "beta v2");
    assert_eq!(updated["team"], "infra");
    assert_eq!(updated["status"], "PENDING");
}

#[test]
fn test_board_override_flag() {
    let temp_dir = setup();
    acb(&temp_dir, "planner")
        .args(["task", "add", "elsewhere", "--board", "nightly"])
        .assert()
        .success();

    assert!(temp_dir.path().join(".acb/boards/nightly.json").exists());
    acb(&temp_dir, "planner")
        .args(["task", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks"));
}

#[test]
fn test_board_name_with_path_is_rejected() {
    let temp_dir = setup();
    acb(&temp_dir, "planner")
        .args(["task", "add", "escape", "--board", "../../outside"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("board.name"));

    assert!(!temp_dir.path().join("outside.json").exists());
    assert!(!temp_dir.path().join(".acb").exists());
}

#[test]
fn test_other_worker_cannot_submit_or_block() {
    let temp_dir = setup();
    add_task(&temp_dir, "t1", "owned");
    acb(&temp_dir, "w1").args(["task", "claim", "t1"]).assert().success();

    acb(&temp_dir, "w2")
        .args(["task", "submit", "t1", "--summary", "stolen"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("assigned to w1"));
    acb(&temp_dir, "w2")
        .args(["task", "block", "t1", "--reason", "mine now"])
        .assert()
        .failure();

    let task = json_output(acb(&temp_dir, "w1").args(["task", "get", "t1"]));
    assert_eq!(task["status"], "CLAIMED");
    assert!(task.get("resultSummary").is_none_or(|v| v.is_null()));
}
