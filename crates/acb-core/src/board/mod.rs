//! Task board store
//!
//! A board is one JSON file holding every live task. [`TaskBoard`] is the only
//! sanctioned way to read or mutate it:
//!
//! - **Mutations** take the board's advisory lock (`<board>.lock`), reload
//!   the file, apply the change, validate, and write it back atomically. A
//!   rejected operation returns before the write, so the file is untouched.
//! - **Reads** take no lock and always reload from disk. Atomic rename
//!   guarantees they see a complete file, possibly one write behind a
//!   concurrent mutation.
//! - **Archival** moves finished tasks into an append-only sibling log
//!   (`<board>.archive.jsonl`); tasks are never deleted in place.
//!
//! # Example
//!
//! ```rust,no_run
//! use agent_coord_core::board::TaskBoard;
//! use agent_coord_core::schema::{NewTask, TaskStatus};
//!
//! let board = TaskBoard::open("/shared/coord/boards/main.json");
//! let task = board.add_task(NewTask::titled("Refresh fixtures"))?;
//! let claimed = board.claim_task(&task.id, "worker-1")?;
//! assert_eq!(claimed.status, TaskStatus::Claimed);
//! # Ok::<(), agent_coord_core::io::CoordError>(())
//! ```

pub mod filter;
pub mod transition;

pub use filter::TaskFilter;
pub use transition::{Action, Outcome};

use crate::io::{acquire_lock, append_line, read_file, write_atomic, CoordError, DEFAULT_LOCK_TIMEOUT};
use crate::schema::{BoardFile, NewTask, Task, TaskStatus, TaskUpdate, RESERVED_TASK_KEYS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use transition::next_status;
use uuid::Uuid;

/// Suffix appended to the board path to form its lock file path
pub const LOCK_SUFFIX: &str = ".lock";

/// Result of a claim attempt
///
/// Losing a race for a task is an expected outcome, not an exceptional one.
/// Environment failures (lock timeout, I/O, corrupt board) are still
/// reported through `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The task is now CLAIMED by the caller
    Claimed(Task),
    /// The task exists but is not claimable right now
    Conflict {
        status: TaskStatus,
        assignee: Option<String>,
        reason: String,
    },
    /// No task with this id exists on the board
    NotFound,
}

/// One line of the archive log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub archived_at: DateTime<Utc>,
    pub task: Task,
}

/// Handle to one board file
///
/// Handles are cheap and hold no open files. Each worker constructs its own
/// handle pointing at the shared path.
#[derive(Debug, Clone)]
pub struct TaskBoard {
    path: PathBuf,
    lock_path: PathBuf,
    archive_path: PathBuf,
    lock_timeout: Duration,
}

enum Change<T> {
    Write(T),
    Skip(T),
}

impl TaskBoard {
    /// Open a board at `path`; the file is created on first mutation
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling_with_suffix(&path, LOCK_SUFFIX);
        let archive_path = path.with_extension("archive.jsonl");
        Self {
            path,
            lock_path,
            archive_path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Set how long mutations wait for the board lock
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Fresh, validated copy of the whole board file
    pub fn snapshot(&self) -> Result<BoardFile, CoordError> {
        load_board(&self.path)
    }

    /// Create a task in PENDING
    ///
    /// A missing id is generated. A supplied id that already exists fails
    /// with `DuplicateTask`; the check runs again under the lock so two
    /// concurrent creators of the same id cannot both succeed.
    pub fn add_task(&self, new: NewTask) -> Result<Task, CoordError> {
        let id = match new.id.as_deref().map(str::trim) {
            Some("") => {
                return Err(CoordError::InvalidUpdate {
                    id: String::new(),
                    reason: "task id is empty".to_string(),
                });
            }
            Some(id) => {
                // Uncontended fast path; authoritative check happens under lock
                if self.snapshot()?.tasks.contains_key(id) {
                    return Err(CoordError::DuplicateTask { id: id.to_string() });
                }
                id.to_string()
            }
            None => Uuid::new_v4().to_string(),
        };
        check_extra_keys(&id, &new.extra_fields)?;
        if new.dependencies.contains(&id) {
            return Err(CoordError::InvalidUpdate {
                id,
                reason: "a task cannot depend on itself".to_string(),
            });
        }

        let task = self.mutate("add_task", |board, now| {
            if board.tasks.contains_key(&id) {
                return Err(CoordError::DuplicateTask { id: id.clone() });
            }
            let task = Task {
                id: id.clone(),
                title: new.title,
                description: new.description,
                status: TaskStatus::Pending,
                assignee: None,
                priority: new.priority,
                dependencies: new.dependencies,
                required_capabilities: new.required_capabilities,
                created_at: now,
                updated_at: now,
                claimed_at: None,
                completed_at: None,
                result_summary: None,
                error_details: None,
                blocked_reason: None,
                blocked_from: None,
                extra_fields: new.extra_fields,
            };
            board.tasks.insert(id.clone(), task.clone());
            Ok(Change::Write(task))
        })?;

        info!(task_id = %task.id, priority = %task.priority, "task added");
        Ok(task)
    }

    /// Read one task from the latest on-disk snapshot
    pub fn get_task(&self, id: &str) -> Result<Task, CoordError> {
        self.snapshot()?
            .tasks
            .remove(id)
            .ok_or_else(|| CoordError::TaskNotFound { id: id.to_string() })
    }

    /// Snapshot copy of matching tasks, highest priority first then oldest
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, CoordError> {
        let mut tasks: Vec<Task> = self
            .snapshot()?
            .tasks
            .into_values()
            .filter(|t| filter.matches(t))
            .collect();
        tasks.sort_by(filter::listing_order);
        Ok(tasks)
    }

    /// Merge descriptive fields into a task
    ///
    /// Status is not updatable here. An `id` in the update that differs from
    /// `id` fails with `InvalidUpdate`.
    pub fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task, CoordError> {
        if let Some(ref new_id) = update.id
            && new_id != id
        {
            return Err(CoordError::InvalidUpdate {
                id: id.to_string(),
                reason: format!("task id is immutable (attempted change to '{new_id}')"),
            });
        }
        check_extra_keys(id, &update.extra_fields)?;
        if let Some(ref deps) = update.dependencies
            && deps.contains(id)
        {
            return Err(CoordError::InvalidUpdate {
                id: id.to_string(),
                reason: "a task cannot depend on itself".to_string(),
            });
        }

        let task = self.mutate("update_task", |board, now| {
            let task = board
                .tasks
                .get_mut(id)
                .ok_or_else(|| CoordError::TaskNotFound { id: id.to_string() })?;

            if let Some(title) = update.title {
                task.title = title;
            }
            if let Some(description) = update.description {
                task.description = description;
            }
            if let Some(priority) = update.priority {
                task.priority = priority;
            }
            if let Some(dependencies) = update.dependencies {
                task.dependencies = dependencies;
            }
            if let Some(capabilities) = update.required_capabilities {
                task.required_capabilities = capabilities;
            }
            for (key, value) in update.extra_fields {
                if value.is_null() {
                    task.extra_fields.remove(&key);
                } else {
                    task.extra_fields.insert(key, value);
                }
            }
            task.touch(now);
            Ok(Change::Write(task.clone()))
        })?;

        debug!(task_id = %task.id, "task updated");
        Ok(task)
    }

    /// Attempt to claim a PENDING task whose dependencies are all COMPLETED
    pub fn try_claim(&self, id: &str, worker_id: &str) -> Result<ClaimOutcome, CoordError> {
        check_worker(id, worker_id)?;
        let archive_path = self.archive_path.clone();

        let outcome = self.mutate("claim_task", |board, now| {
            let Some(task) = board.tasks.get(id) else {
                return Ok(Change::Skip(ClaimOutcome::NotFound));
            };
            if task.status != TaskStatus::Pending {
                return Ok(Change::Skip(ClaimOutcome::Conflict {
                    status: task.status,
                    assignee: task.assignee.clone(),
                    reason: format!("task is {}, not PENDING", task.status),
                }));
            }
            let unresolved = unresolved_dependencies(board, task, &archive_path)?;
            if !unresolved.is_empty() {
                return Ok(Change::Skip(ClaimOutcome::Conflict {
                    status: task.status,
                    assignee: None,
                    reason: format!("unresolved dependencies: {}", unresolved.join(", ")),
                }));
            }
            let task = claim_in_place(board, id, worker_id, now)?;
            Ok(Change::Write(ClaimOutcome::Claimed(task)))
        })?;

        match &outcome {
            ClaimOutcome::Claimed(task) => {
                info!(task_id = %task.id, worker = worker_id, "task claimed")
            }
            ClaimOutcome::Conflict { reason, .. } => {
                debug!(task_id = id, worker = worker_id, reason = %reason, "claim conflict")
            }
            ClaimOutcome::NotFound => debug!(task_id = id, "claim on missing task"),
        }
        Ok(outcome)
    }

    /// Claim a task, mapping a lost race to `InvalidTransition`
    pub fn claim_task(&self, id: &str, worker_id: &str) -> Result<Task, CoordError> {
        match self.try_claim(id, worker_id)? {
            ClaimOutcome::Claimed(task) => Ok(task),
            ClaimOutcome::Conflict { status, reason, .. } => Err(CoordError::InvalidTransition {
                id: id.to_string(),
                from: status,
                action: Action::Claim.name(),
                reason,
            }),
            ClaimOutcome::NotFound => Err(CoordError::TaskNotFound { id: id.to_string() }),
        }
    }

    /// Claim the best eligible PENDING task in a single lock section
    ///
    /// Eligible tasks have all dependencies COMPLETED and, when
    /// `capabilities` is given, required capabilities covered by it. The
    /// highest priority wins, then the oldest. `Ok(None)` means nothing is
    /// eligible; lock contention is reported as `Err(LockTimeout)`.
    pub fn claim_next(
        &self,
        worker_id: &str,
        capabilities: Option<&BTreeSet<String>>,
    ) -> Result<Option<Task>, CoordError> {
        check_worker("", worker_id)?;
        let archive_path = self.archive_path.clone();

        let claimed = self.mutate("claim_next", |board, now| {
            let mut candidates: Vec<&Task> = board
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Pending)
                .filter(|t| capabilities.is_none_or(|caps| t.required_capabilities.is_subset(caps)))
                .collect();
            candidates.sort_by(|a, b| filter::listing_order(a, b));

            let mut chosen = None;
            for task in candidates {
                if unresolved_dependencies(board, task, &archive_path)?.is_empty() {
                    chosen = Some(task.id.clone());
                    break;
                }
            }

            match chosen {
                Some(id) => Ok(Change::Write(Some(claim_in_place(board, &id, worker_id, now)?))),
                None => Ok(Change::Skip(None)),
            }
        })?;

        match &claimed {
            Some(task) => info!(task_id = %task.id, worker = worker_id, "task claimed"),
            None => debug!(worker = worker_id, "no eligible task"),
        }
        Ok(claimed)
    }

    /// CLAIMED → WORKING; `worker_id` must be the assignee
    pub fn start_work(&self, id: &str, worker_id: &str) -> Result<Task, CoordError> {
        self.transition(id, Action::Start, Some(worker_id), |_, _, _| {})
    }

    /// WORKING → COMPLETED_PENDING_REVIEW with a result summary
    pub fn submit_for_review(&self, id: &str, result_summary: &str) -> Result<Task, CoordError> {
        self.transition(id, Action::Submit, None, |task, _, _| {
            task.result_summary = Some(result_summary.to_string());
        })
    }

    /// WORKING → COMPLETED_PENDING_REVIEW recording why the work failed
    pub fn submit_failure(&self, id: &str, error_details: &str) -> Result<Task, CoordError> {
        self.transition(id, Action::Submit, None, |task, _, _| {
            task.error_details = Some(error_details.to_string());
        })
    }

    /// Submit a task held by `worker_id` for review in one lock section
    ///
    /// A task still CLAIMED is started first. `Outcome::Success` records
    /// `notes` as the result summary, `Outcome::Failure` as the error
    /// details. Returns the status the task held before the call.
    pub fn submit_as(
        &self,
        id: &str,
        worker_id: &str,
        outcome: Outcome,
        notes: &str,
    ) -> Result<(TaskStatus, Task), CoordError> {
        check_worker(id, worker_id)?;

        let result = self.mutate(Action::Submit.name(), |board, now| {
            let task = board
                .tasks
                .get_mut(id)
                .ok_or_else(|| CoordError::TaskNotFound { id: id.to_string() })?;

            let prior = task.status;
            if prior == TaskStatus::Claimed {
                step(task, Action::Start, Some(worker_id))?;
            }
            step(task, Action::Submit, Some(worker_id))?;
            match outcome {
                Outcome::Success => task.result_summary = Some(notes.to_string()),
                Outcome::Failure => task.error_details = Some(notes.to_string()),
            }
            task.touch(now);
            Ok(Change::Write((prior, task.clone())))
        });

        match result {
            Ok((prior, task)) => {
                info!(task_id = %task.id, from = %prior, to = %task.status, worker = worker_id, "task submitted");
                Ok((prior, task))
            }
            Err(e) => {
                debug!(task_id = id, worker = worker_id, error_kind = e.kind(), "submit rejected");
                Err(e)
            }
        }
    }

    /// COMPLETED_PENDING_REVIEW → COMPLETED or FAILED
    ///
    /// Review notes are appended to the summary on success and become the
    /// error details on failure.
    pub fn finalize(
        &self,
        id: &str,
        outcome: Outcome,
        notes: Option<&str>,
    ) -> Result<Task, CoordError> {
        self.transition(id, Action::Finalize(outcome), None, |task, _, now| {
            task.completed_at = Some(now);
            match outcome {
                Outcome::Success => {
                    if let Some(notes) = notes {
                        task.result_summary = Some(match task.result_summary.take() {
                            Some(summary) => format!("{summary}\n\nReview: {notes}"),
                            None => notes.to_string(),
                        });
                    }
                }
                Outcome::Failure => {
                    if let Some(notes) = notes {
                        task.error_details = Some(notes.to_string());
                    } else if task.error_details.is_none() {
                        task.error_details = Some("rejected in review".to_string());
                    }
                }
            }
        })
    }

    /// CLAIMED|WORKING → BLOCKED, remembering the prior state
    pub fn mark_blocked(&self, id: &str, reason: &str) -> Result<Task, CoordError> {
        self.block_with(id, None, reason)
    }

    /// [`mark_blocked`](Self::mark_blocked), only for the task's assignee
    pub fn block_as(&self, id: &str, worker_id: &str, reason: &str) -> Result<Task, CoordError> {
        check_worker(id, worker_id)?;
        self.block_with(id, Some(worker_id), reason)
    }

    fn block_with(&self, id: &str, worker_id: Option<&str>, reason: &str) -> Result<Task, CoordError> {
        self.transition(id, Action::Block, worker_id, |task, prior, _| {
            task.blocked_from = Some(prior);
            task.blocked_reason = Some(reason.to_string());
        })
    }

    /// BLOCKED → the state the task was blocked from
    pub fn unblock(&self, id: &str) -> Result<Task, CoordError> {
        self.transition(id, Action::Unblock, None, |task, _, _| {
            task.blocked_from = None;
            task.blocked_reason = None;
        })
    }

    /// Move finished tasks into the archive log
    ///
    /// COMPLETED and FAILED tasks are archived unless a task still on the
    /// board (and not itself finished) lists them as a dependency. Records are
    /// appended before the board is rewritten, both under the board lock.
    pub fn archive_finished(&self) -> Result<Vec<Task>, CoordError> {
        let archive_path = self.archive_path.clone();

        let archived = self.mutate("archive_finished", |board, now| {
            let still_needed: HashSet<&String> = board
                .tasks
                .values()
                .filter(|t| !t.status.is_terminal())
                .flat_map(|t| t.dependencies.iter())
                .collect();

            let ids: Vec<String> = board
                .tasks
                .values()
                .filter(|t| t.status.is_terminal() && !still_needed.contains(&t.id))
                .map(|t| t.id.clone())
                .collect();

            if ids.is_empty() {
                return Ok(Change::Skip(Vec::new()));
            }

            let mut lines = Vec::new();
            let mut archived = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(task) = board.tasks.remove(&id) {
                    let record = ArchiveRecord {
                        archived_at: now,
                        task,
                    };
                    if !lines.is_empty() {
                        lines.push(b'\n');
                    }
                    serde_json::to_writer(&mut lines, &record)
                        .map_err(|e| CoordError::json(&archive_path, e))?;
                    archived.push(record.task);
                }
            }
            // One append for the whole batch
            append_line(&archive_path, &lines)?;
            Ok(Change::Write(archived))
        })?;

        if !archived.is_empty() {
            info!(count = archived.len(), archive = %self.archive_path.display(), "archived finished tasks");
        }
        Ok(archived)
    }

    /// Read every record from the archive log
    ///
    /// Malformed lines are skipped with a warning.
    pub fn read_archive(&self) -> Result<Vec<ArchiveRecord>, CoordError> {
        read_archive_file(&self.archive_path)
    }

    fn transition<F>(
        &self,
        id: &str,
        action: Action,
        worker_id: Option<&str>,
        edit: F,
    ) -> Result<Task, CoordError>
    where
        F: FnOnce(&mut Task, TaskStatus, DateTime<Utc>),
    {
        let task = self.mutate(action.name(), |board, now| {
            let task = board
                .tasks
                .get_mut(id)
                .ok_or_else(|| CoordError::TaskNotFound { id: id.to_string() })?;

            let prior = step(task, action, worker_id)?;
            edit(task, prior, now);
            task.touch(now);
            Ok(Change::Write((prior, task.clone())))
        });

        match task {
            Ok((prior, task)) => {
                info!(task_id = %task.id, from = %prior, to = %task.status, "task status changed");
                Ok(task)
            }
            Err(e) => {
                debug!(task_id = id, action = action.name(), error_kind = e.kind(), "transition rejected");
                Err(e)
            }
        }
    }

    /// Lock, reload, apply `op`, validate, write back
    fn mutate<T, F>(&self, op_name: &str, op: F) -> Result<T, CoordError>
    where
        F: FnOnce(&mut BoardFile, DateTime<Utc>) -> Result<Change<T>, CoordError>,
    {
        let _lock = acquire_lock(&self.lock_path, self.lock_timeout)?;
        let mut board = load_board(&self.path)?;

        match op(&mut board, Utc::now())? {
            Change::Skip(value) => Ok(value),
            Change::Write(value) => {
                validate_board(&self.path, &board)?;
                let content =
                    serde_json::to_vec_pretty(&board).map_err(|e| CoordError::json(&self.path, e))?;
                write_atomic(&self.path, &content)?;
                debug!(op = op_name, board = %self.path.display(), tasks = board.tasks.len(), "board saved");
                Ok(value)
            }
        }
        // Lock released on drop
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn check_worker(id: &str, worker_id: &str) -> Result<(), CoordError> {
    if worker_id.trim().is_empty() {
        return Err(CoordError::InvalidUpdate {
            id: id.to_string(),
            reason: "worker id is empty".to_string(),
        });
    }
    Ok(())
}

/// Move `task` along the `action` edge, returning the status it left
///
/// With `worker_id`, the task must be assigned to that worker. Nothing is
/// changed on error.
fn step(task: &mut Task, action: Action, worker_id: Option<&str>) -> Result<TaskStatus, CoordError> {
    let prior = task.status;
    let to = next_status(prior, task.blocked_from, action).ok_or_else(|| {
        CoordError::InvalidTransition {
            id: task.id.clone(),
            from: prior,
            action: action.name(),
            reason: format!("no '{}' edge from {prior}", action.name()),
        }
    })?;

    if let Some(worker) = worker_id
        && task.assignee.as_deref() != Some(worker)
    {
        return Err(CoordError::InvalidTransition {
            id: task.id.clone(),
            from: prior,
            action: action.name(),
            reason: format!(
                "task is assigned to {}, not '{worker}'",
                task.assignee.as_deref().unwrap_or("nobody")
            ),
        });
    }

    task.status = to;
    Ok(prior)
}

fn check_extra_keys(
    id: &str,
    extra: &HashMap<String, serde_json::Value>,
) -> Result<(), CoordError> {
    if let Some(key) = extra.keys().find(|k| RESERVED_TASK_KEYS.contains(&k.as_str())) {
        return Err(CoordError::InvalidUpdate {
            id: id.to_string(),
            reason: format!("field '{key}' cannot be set through this operation"),
        });
    }
    Ok(())
}

fn claim_in_place(
    board: &mut BoardFile,
    id: &str,
    worker_id: &str,
    now: DateTime<Utc>,
) -> Result<Task, CoordError> {
    let task = board
        .tasks
        .get_mut(id)
        .ok_or_else(|| CoordError::TaskNotFound { id: id.to_string() })?;
    task.status = TaskStatus::Claimed;
    task.assignee = Some(worker_id.to_string());
    task.claimed_at = Some(now);
    task.touch(now);
    Ok(task.clone())
}

/// Dependencies of `task` that are not COMPLETED
///
/// A dependency missing from the board counts as resolved only if the
/// archive records it as COMPLETED.
fn unresolved_dependencies(
    board: &BoardFile,
    task: &Task,
    archive_path: &Path,
) -> Result<Vec<String>, CoordError> {
    let mut unresolved = Vec::new();
    let mut missing = Vec::new();
    for dep in &task.dependencies {
        match board.tasks.get(dep) {
            Some(t) if t.status == TaskStatus::Completed => {}
            Some(_) => unresolved.push(dep.clone()),
            None => missing.push(dep.clone()),
        }
    }

    if !missing.is_empty() {
        let archived_done: HashSet<String> = read_archive_file(archive_path)?
            .into_iter()
            .filter(|r| r.task.status == TaskStatus::Completed)
            .map(|r| r.task.id)
            .collect();
        unresolved.extend(missing.into_iter().filter(|d| !archived_done.contains(d)));
    }
    Ok(unresolved)
}

fn read_archive_file(path: &Path) -> Result<Vec<ArchiveRecord>, CoordError> {
    let Some(bytes) = read_file(path)? else {
        return Ok(Vec::new());
    };
    let mut records = Vec::new();
    for (idx, line) in bytes.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<ArchiveRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(archive = %path.display(), line = idx + 1, error = %e, "skipping malformed archive line"),
        }
    }
    Ok(records)
}

/// Load and validate a board file; a missing file is an empty board
fn load_board(path: &Path) -> Result<BoardFile, CoordError> {
    let Some(bytes) = read_file(path)? else {
        return Ok(BoardFile::default());
    };
    let board: BoardFile = serde_json::from_slice(&bytes).map_err(|e| CoordError::json(path, e))?;
    validate_board(path, &board)?;
    Ok(board)
}

fn validate_board(path: &Path, board: &BoardFile) -> Result<(), CoordError> {
    let corrupt = |reason: String| CoordError::CorruptBoard {
        path: path.to_path_buf(),
        reason,
    };

    if board.version > crate::schema::BOARD_SCHEMA_VERSION {
        return Err(corrupt(format!(
            "board schema version {} is newer than supported {}",
            board.version,
            crate::schema::BOARD_SCHEMA_VERSION
        )));
    }
    for (key, task) in &board.tasks {
        if key != &task.id {
            return Err(corrupt(format!("entry '{key}' holds task '{}'", task.id)));
        }
        if !transition::is_reachable(task.status) {
            return Err(corrupt(format!("task '{key}' has unreachable status {}", task.status)));
        }
        task.validate().map_err(corrupt)?;
    }
    Ok(())
}
