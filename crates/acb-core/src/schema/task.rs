//! Task schema types for the shared task board

use super::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Current board file schema version
pub const BOARD_SCHEMA_VERSION: u32 = 1;

/// Task status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, waiting for a worker
    Pending,
    /// Owned by a worker, work not started
    Claimed,
    /// Worker is actively working on it
    Working,
    /// Worker finished; waiting for a reviewer to finalize
    CompletedPendingReview,
    /// Finished successfully (terminal)
    Completed,
    /// Finished unsuccessfully (terminal)
    Failed,
    /// Temporarily halted; resumes to the state it was blocked from
    Blocked,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Pending,
        TaskStatus::Claimed,
        TaskStatus::Working,
        TaskStatus::CompletedPendingReview,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Claimed => "CLAIMED",
            TaskStatus::Working => "WORKING",
            TaskStatus::CompletedPendingReview => "COMPLETED_PENDING_REVIEW",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Blocked => "BLOCKED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Statuses in which the task is owned by an assignee
    pub fn requires_assignee(&self) -> bool {
        matches!(
            self,
            TaskStatus::Claimed | TaskStatus::Working | TaskStatus::Blocked
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown task status '{s}'"))
    }
}

/// Keys owned by `Task` itself; they may not appear in `extra_fields`
pub const RESERVED_TASK_KEYS: [&str; 16] = [
    "id",
    "title",
    "description",
    "status",
    "assignee",
    "priority",
    "dependencies",
    "requiredCapabilities",
    "created_at",
    "updated_at",
    "claimed_at",
    "completed_at",
    "resultSummary",
    "errorDetails",
    "blockedReason",
    "blockedFrom",
];

/// Task record stored on a board
///
/// Unknown JSON fields are kept in `extra_fields` and written back unchanged
/// on every read-modify-write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier, immutable once assigned
    pub id: String,

    /// Brief imperative title
    pub title: String,

    /// Detailed requirements and acceptance criteria
    #[serde(default)]
    pub description: String,

    /// Current task status
    pub status: TaskStatus,

    /// Worker that owns the task (null if unassigned)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    /// Task IDs that must reach COMPLETED before this task can be claimed
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<String>,

    /// Capability tags a worker must hold to be offered this task
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub required_capabilities: BTreeSet<String>,

    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updated_at")]
    pub updated_at: DateTime<Utc>,

    #[serde(rename = "claimed_at", default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,

    #[serde(rename = "completed_at", default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,

    /// Why the task is blocked (only while BLOCKED)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,

    /// Status to restore on unblock (only while BLOCKED)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_from: Option<TaskStatus>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub extra_fields: HashMap<String, serde_json::Value>,
}

impl Task {
    /// Advance `updated_at` without ever moving it backwards
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Check the per-record invariants that must hold on disk
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("task id is empty".to_string());
        }
        if self.updated_at < self.created_at {
            return Err(format!("task '{}' updated_at precedes created_at", self.id));
        }
        if self.status.requires_assignee() && self.assignee.is_none() {
            return Err(format!(
                "task '{}' is {} without an assignee",
                self.id, self.status
            ));
        }
        if self.dependencies.contains(&self.id) {
            return Err(format!("task '{}' depends on itself", self.id));
        }
        match (self.status, self.blocked_from) {
            (TaskStatus::Blocked, Some(TaskStatus::Claimed | TaskStatus::Working)) => Ok(()),
            (TaskStatus::Blocked, other) => Err(format!(
                "task '{}' is BLOCKED with invalid prior state {:?}",
                self.id, other
            )),
            (_, Some(_)) => Err(format!(
                "task '{}' records a blocked prior state while {}",
                self.id, self.status
            )),
            (_, None) => Ok(()),
        }
    }
}

/// Fields supplied when creating a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Explicit id; a UUID is generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default)]
    pub required_capabilities: BTreeSet<String>,
    #[serde(flatten)]
    pub extra_fields: HashMap<String, serde_json::Value>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Partial update merged into an existing task
///
/// Status is absent: it only changes through the board's transition
/// operations. `id` is accepted so that an attempt to change it
/// can be rejected explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_capabilities: Option<BTreeSet<String>>,
    /// Merged key-by-key into `extra_fields`; a JSON null removes the key
    #[serde(flatten)]
    pub extra_fields: HashMap<String, serde_json::Value>,
}

/// On-disk board document: `{ "version": 1, "tasks": { "<id>": Task } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardFile {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,

    /// Unknown top-level fields for forward compatibility
    #[serde(flatten)]
    pub extra_fields: HashMap<String, serde_json::Value>,
}

impl Default for BoardFile {
    fn default() -> Self {
        Self {
            version: BOARD_SCHEMA_VERSION,
            tasks: BTreeMap::new(),
            extra_fields: HashMap::new(),
        }
    }
}

fn default_version() -> u32 {
    BOARD_SCHEMA_VERSION
}
