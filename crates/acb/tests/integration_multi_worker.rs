//! Several `acb` processes racing on one board

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use tempfile::TempDir;

fn setup() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".git")).unwrap();
    temp_dir
}

fn spawn_acb(dir: &Path, identity: &str, args: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_acb"))
        .args(args)
        .env("ACB_HOME", dir)
        .env("ACB_IDENTITY", identity)
        .env("ACB_LOG", "error")
        .env_remove("ACB_ROOT")
        .env_remove("ACB_BOARD")
        .env_remove("ACB_LOCK_TIMEOUT_MS")
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

fn run_acb(dir: &Path, identity: &str, args: &[&str]) -> Output {
    spawn_acb(dir, identity, args).wait_with_output().unwrap()
}

#[test]
fn test_racing_claims_have_one_winner() {
    let temp_dir = setup();
    let added = run_acb(temp_dir.path(), "planner", &["task", "add", "contested", "--id", "t1"]);
    assert!(added.status.success());

    let children: Vec<Child> = (0..6)
        .map(|i| spawn_acb(temp_dir.path(), &format!("w{i}"), &["task", "claim", "t1"]))
        .collect();
    let outputs: Vec<Output> = children
        .into_iter()
        .map(|child| child.wait_with_output().unwrap())
        .collect();

    let winners = outputs.iter().filter(|o| o.status.success()).count();
    assert_eq!(winners, 1);
    for loser in outputs.iter().filter(|o| !o.status.success()) {
        let stderr = String::from_utf8_lossy(&loser.stderr);
        assert!(stderr.contains("Cannot claim task 't1'"), "unexpected stderr: {stderr}");
    }
}

#[test]
fn test_racing_next_hands_out_distinct_tasks() {
    let temp_dir = setup();
    for i in 0..4 {
        let id = format!("t{i}");
        let added = run_acb(temp_dir.path(), "planner", &["task", "add", "job", "--id", &id]);
        assert!(added.status.success());
    }

    let children: Vec<Child> = (0..4)
        .map(|i| spawn_acb(temp_dir.path(), &format!("w{i}"), &["task", "next", "--json"]))
        .collect();

    let mut claimed = HashSet::new();
    for child in children {
        let output = child.wait_with_output().unwrap();
        assert!(
            output.status.success(),
            "next failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let task: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(task["status"], "CLAIMED");
        claimed.insert(task["id"].as_str().unwrap().to_string());
    }
    assert_eq!(claimed.len(), 4);

    // Board is still readable and every task is assigned exactly once
    let listed = run_acb(temp_dir.path(), "planner", &["task", "list", "--status", "CLAIMED", "--json"]);
    let tasks: serde_json::Value = serde_json::from_slice(&listed.stdout).unwrap();
    let assignees: HashSet<_> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["assignee"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(assignees.len(), 4);
}

#[test]
fn test_concurrent_senders_all_delivered() {
    let temp_dir = setup();
    let children: Vec<Child> = (0..5)
        .map(|i| {
            spawn_acb(
                temp_dir.path(),
                &format!("sender-{i}"),
                &["mail", "send", "hub", &format!("hello {i}"), "hi"],
            )
        })
        .collect();
    for child in children {
        assert!(child.wait_with_output().unwrap().status.success());
    }

    let polled = run_acb(temp_dir.path(), "hub", &["mail", "poll", "--json"]);
    let messages: serde_json::Value = serde_json::from_slice(&polled.stdout).unwrap();
    assert_eq!(messages.as_array().unwrap().len(), 5);
}
