//! Multi-handle board tests: mutual exclusion, stray temp files, restart

use agent_coord_core::board::{ClaimOutcome, TaskBoard, TaskFilter};
use agent_coord_core::io::CoordError;
use agent_coord_core::schema::{NewTask, TaskStatus};
use std::collections::BTreeSet;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

const WORKERS: usize = 8;

fn board_in(temp_dir: &TempDir) -> TaskBoard {
    TaskBoard::open(temp_dir.path().join("boards/main.json"))
}

#[test]
fn test_concurrent_claims_have_exactly_one_winner() {
    let temp_dir = TempDir::new().unwrap();
    let task = board_in(&temp_dir).add_task(NewTask::titled("contested")).unwrap();

    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let board = board_in(&temp_dir);
            let barrier = barrier.clone();
            let id = task.id.clone();
            thread::spawn(move || {
                barrier.wait();
                board.claim_task(&id, &format!("w{i}"))
            })
        })
        .collect();

    let results: Vec<Result<_, CoordError>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "expected exactly one successful claim");
    let losers = results
        .iter()
        .filter(|r| matches!(r, Err(CoordError::InvalidTransition { .. })))
        .count();
    assert_eq!(losers, WORKERS - 1);

    let stored = board_in(&temp_dir).get_task(&task.id).unwrap();
    assert_eq!(stored.status, TaskStatus::Claimed);
    assert_eq!(stored.assignee, winners[0].assignee);
}

#[test]
fn test_concurrent_try_claim_reports_conflicts() {
    let temp_dir = TempDir::new().unwrap();
    let task = board_in(&temp_dir).add_task(NewTask::titled("contested")).unwrap();

    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let board = board_in(&temp_dir);
            let barrier = barrier.clone();
            let id = task.id.clone();
            thread::spawn(move || {
                barrier.wait();
                board.try_claim(&id, &format!("w{i}")).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<ClaimOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let claimed = outcomes
        .iter()
        .filter(|o| matches!(o, ClaimOutcome::Claimed(_)))
        .count();
    let conflicts = outcomes
        .iter()
        .filter(|o| matches!(o, ClaimOutcome::Conflict { status: TaskStatus::Claimed, .. }))
        .count();
    assert_eq!(claimed, 1);
    assert_eq!(conflicts, WORKERS - 1);
}

#[test]
fn test_concurrent_claim_next_hands_out_distinct_tasks() {
    let temp_dir = TempDir::new().unwrap();
    let board = board_in(&temp_dir);
    for i in 0..WORKERS / 2 {
        board.add_task(NewTask::titled(format!("job {i}"))).unwrap();
    }

    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let board = board_in(&temp_dir);
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                board.claim_next(&format!("w{i}"), None).unwrap()
            })
        })
        .collect();

    let claimed: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(claimed.len(), WORKERS / 2);
    let ids: BTreeSet<_> = claimed.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids.len(), WORKERS / 2, "a task was handed out twice");
}

#[test]
fn test_concurrent_adds_are_all_kept() {
    let temp_dir = TempDir::new().unwrap();
    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let board = board_in(&temp_dir);
            thread::spawn(move || board.add_task(NewTask::titled(format!("task {i}"))).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let tasks = board_in(&temp_dir).list_tasks(&TaskFilter::default()).unwrap();
    assert_eq!(tasks.len(), WORKERS);
}

#[test]
fn test_leftover_temp_file_does_not_corrupt_board() {
    let temp_dir = TempDir::new().unwrap();
    let board = board_in(&temp_dir);
    let task = board.add_task(NewTask::titled("survivor")).unwrap();

    // Simulate a writer that died between creating its temp file and renaming
    let stray = board.path().parent().unwrap().join(".main.json.crashed.tmp");
    fs::write(&stray, b"{\"version\": 1, \"tasks\": {\"ghost\"").unwrap();

    let reopened = board_in(&temp_dir);
    assert_eq!(reopened.get_task(&task.id).unwrap().title, "survivor");
    reopened.claim_task(&task.id, "w1").unwrap();
    assert_eq!(reopened.snapshot().unwrap().tasks.len(), 1);
    assert!(stray.exists(), "stray temp files are left for the operator");
}

#[test]
fn test_restart_sees_identical_state() {
    let temp_dir = TempDir::new().unwrap();
    let before = {
        let board = board_in(&temp_dir);
        let a = board.add_task(NewTask::titled("a")).unwrap();
        let mut new_b = NewTask::titled("b");
        new_b.dependencies = BTreeSet::from([a.id.clone()]);
        board.add_task(new_b).unwrap();
        board.claim_task(&a.id, "w1").unwrap();
        board.start_work(&a.id, "w1").unwrap();
        board.snapshot().unwrap()
    };

    let after = board_in(&temp_dir).snapshot().unwrap();
    assert_eq!(before, after);

    // Re-running a read-only pass after restart changes nothing on disk
    let bytes = fs::read(board_in(&temp_dir).path()).unwrap();
    board_in(&temp_dir).list_tasks(&TaskFilter::default()).unwrap();
    assert_eq!(fs::read(board_in(&temp_dir).path()).unwrap(), bytes);
}

#[test]
fn test_dependency_blocks_claim_until_completed() {
    let temp_dir = TempDir::new().unwrap();
    let board = board_in(&temp_dir);
    let base = board.add_task(NewTask::titled("base")).unwrap();
    let mut dependent = NewTask::titled("dependent");
    dependent.dependencies = BTreeSet::from([base.id.clone()]);
    let dependent = board.add_task(dependent).unwrap();

    assert!(matches!(
        board.claim_task(&dependent.id, "w2"),
        Err(CoordError::InvalidTransition { .. })
    ));

    board.claim_task(&base.id, "w1").unwrap();
    board.start_work(&base.id, "w1").unwrap();
    board.submit_for_review(&base.id, "done").unwrap();
    board
        .finalize(&base.id, agent_coord_core::board::Outcome::Success, None)
        .unwrap();

    // A finished task that a live task still depends on stays on the board
    assert!(board.archive_finished().unwrap().is_empty());
    let claimed = board.claim_task(&dependent.id, "w2").unwrap();
    assert_eq!(claimed.status, TaskStatus::Claimed);
}
