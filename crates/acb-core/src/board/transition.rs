//! Task state machine
//!
//! ```text
//! PENDING --claim--> CLAIMED --start--> WORKING --submit--> COMPLETED_PENDING_REVIEW --finalize(ok)--> COMPLETED
//!                                          |                                    \--finalize(fail)--> FAILED
//!                                          +--block--> BLOCKED --unblock--> WORKING
//! CLAIMED --block--> BLOCKED --unblock--> CLAIMED
//! ```

use crate::schema::TaskStatus;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Result of a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" | "ok" | "completed" | "pass" => Ok(Outcome::Success),
            "failure" | "fail" | "failed" | "reject" => Ok(Outcome::Failure),
            other => Err(format!("unknown outcome '{other}'")),
        }
    }
}

/// A state machine edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Claim,
    Start,
    Submit,
    Finalize(Outcome),
    Block,
    Unblock,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Claim => "claim",
            Action::Start => "start",
            Action::Submit => "submit",
            Action::Finalize(_) => "finalize",
            Action::Block => "block",
            Action::Unblock => "unblock",
        }
    }
}

/// Target status of `action` taken from `from`, or `None` if it is not an edge
///
/// `blocked_from` is the status recorded when the task was blocked; it picks
/// the unblock target.
pub fn next_status(
    from: TaskStatus,
    blocked_from: Option<TaskStatus>,
    action: Action,
) -> Option<TaskStatus> {
    use TaskStatus::*;

    match (from, action) {
        (Pending, Action::Claim) => Some(Claimed),
        (Claimed, Action::Start) => Some(Working),
        (Working, Action::Submit) => Some(CompletedPendingReview),
        (CompletedPendingReview, Action::Finalize(Outcome::Success)) => Some(Completed),
        (CompletedPendingReview, Action::Finalize(Outcome::Failure)) => Some(Failed),
        (Claimed | Working, Action::Block) => Some(Blocked),
        (Blocked, Action::Unblock) => match blocked_from {
            Some(prior @ (Claimed | Working)) => Some(prior),
            _ => None,
        },
        _ => None,
    }
}

/// Every `(from, to)` edge of the state graph
pub fn edges() -> Vec<(TaskStatus, TaskStatus)> {
    const ACTIONS: [Action; 7] = [
        Action::Claim,
        Action::Start,
        Action::Submit,
        Action::Finalize(Outcome::Success),
        Action::Finalize(Outcome::Failure),
        Action::Block,
        Action::Unblock,
    ];

    let mut out = Vec::new();
    for from in TaskStatus::ALL {
        for action in ACTIONS {
            for prior in [Some(TaskStatus::Claimed), Some(TaskStatus::Working)] {
                if let Some(to) = next_status(from, prior, action)
                    && !out.contains(&(from, to))
                {
                    out.push((from, to));
                }
            }
        }
    }
    out
}

/// Whether `status` can be reached from `PENDING` along valid edges
pub fn is_reachable(status: TaskStatus) -> bool {
    let edges = edges();
    let mut seen = HashSet::from([TaskStatus::Pending]);
    let mut queue = VecDeque::from([TaskStatus::Pending]);

    while let Some(current) = queue.pop_front() {
        if current == status {
            return true;
        }
        for &(from, to) in &edges {
            if from == current && seen.insert(to) {
                queue.push_back(to);
            }
        }
    }
    false
}
