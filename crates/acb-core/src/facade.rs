//! Worker-facing coordination API
//!
//! A [`Coordinator`] bundles one worker's view of the shared state: a board
//! handle, the worker's own mailbox and an event bus. Every successful
//! mutation publishes an event whose correlation id is the task or message
//! id, so a subscriber can follow one task across its whole lifecycle.
//!
//! ```rust,no_run
//! use agent_coord_core::config::{resolve_config, ConfigOverrides};
//! use agent_coord_core::facade::{Coordinator, Report};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let home = agent_coord_core::home::get_home_dir()?;
//! let config = resolve_config(&ConfigOverrides::default(), Path::new("."), &home)?;
//! let worker = Coordinator::from_config(&config, &home)?;
//!
//! if let Some(task) = worker.claim_next(None)? {
//!     worker.report(&task.id, Report::Done, "fixtures regenerated")?;
//! }
//! for message in worker.poll_inbox()? {
//!     println!("{}: {}", message.sender_id, message.subject);
//! }
//! # Ok(())
//! # }
//! ```

use crate::board::{Outcome, TaskBoard, TaskFilter};
use crate::config::Config;
use crate::events::{topics, EventBus, EventJournal, SubscriptionId};
use crate::io::CoordError;
use crate::mailbox::{AckOutcome, AckResult, Delivery, Mailbox};
use crate::payload;
use crate::schema::{Event, Message, MessageDraft, MessageType, NewTask, Task, TaskStatus, TaskUpdate};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Default number of messages returned by [`Coordinator::poll_inbox`]
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// What a worker reports about its task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// Work finished; submit for review
    Done,
    /// Work could not be finished; submit for review with error details
    Failed,
    /// Work cannot proceed for now
    Blocked,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Report::Done => "done",
            Report::Failed => "failed",
            Report::Blocked => "blocked",
        })
    }
}

impl std::str::FromStr for Report {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "done" | "complete" | "completed" => Ok(Report::Done),
            "failed" | "fail" => Ok(Report::Failed),
            "blocked" | "block" => Ok(Report::Blocked),
            other => Err(format!("unknown report '{other}'")),
        }
    }
}

/// One worker's handle on the board, its mailbox and the event bus
#[derive(Debug, Clone)]
pub struct Coordinator {
    identity: String,
    board: TaskBoard,
    mailbox: Mailbox,
    bus: EventBus,
    batch_size: usize,
}

impl Coordinator {
    /// Assemble a coordinator from parts; `mailbox.owner()` is the identity
    pub fn new(board: TaskBoard, mailbox: Mailbox, bus: EventBus) -> Self {
        Self {
            identity: mailbox.owner().to_string(),
            board,
            mailbox,
            bus,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Build everything from resolved configuration
    ///
    /// Opens the configured board and the identity's mailbox under the
    /// coordination root, and attaches an [`EventJournal`] when
    /// `events.journal` is set.
    pub fn from_config(config: &Config, home: &Path) -> Result<Self, CoordError> {
        let identity = config.core.identity.as_str();
        let board = TaskBoard::open(config.board_path(home)).with_lock_timeout(config.lock_timeout());
        let mailbox = Mailbox::open(config.mail_root(home), identity)?;
        let bus = EventBus::new(identity);

        if let Some(journal_config) = config.journal_config(home) {
            EventJournal::new(journal_config).attach(&bus);
        }

        Ok(Self::new(board, mailbox, bus).with_batch_size(config.mailbox.batch_size))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe<F>(&self, pattern: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.subscribe(pattern, handler)
    }

    // ---- tasks ----------------------------------------------------------

    pub fn add_task(&self, new: NewTask) -> Result<Task, CoordError> {
        let task = self.board.add_task(new)?;
        self.bus.publish(
            topics::TASK_CREATED,
            payload! {
                "taskId" => task.id,
                "title" => task.title,
                "priority" => task.priority.as_str(),
                "worker" => self.identity,
            },
            Some(task.id.clone()),
        );
        Ok(task)
    }

    pub fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task, CoordError> {
        let task = self.board.update_task(id, update)?;
        self.bus.publish(
            topics::TASK_UPDATED,
            payload! { "taskId" => task.id, "worker" => self.identity },
            Some(task.id.clone()),
        );
        Ok(task)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, CoordError> {
        self.board.list_tasks(filter)
    }

    /// Claim the best eligible PENDING task for this worker
    ///
    /// `None` means nothing is eligible. Contention surfaces as
    /// `Err(CoordError::LockTimeout)`.
    pub fn claim_next(&self, capabilities: Option<&BTreeSet<String>>) -> Result<Option<Task>, CoordError> {
        let claimed = self.board.claim_next(&self.identity, capabilities)?;
        if let Some(ref task) = claimed {
            self.publish_claim(task);
        }
        Ok(claimed)
    }

    /// Claim a specific task; losing the race is `InvalidTransition`
    pub fn claim(&self, id: &str) -> Result<Task, CoordError> {
        let task = self.board.claim_task(id, &self.identity)?;
        self.publish_claim(&task);
        Ok(task)
    }

    pub fn start(&self, id: &str) -> Result<Task, CoordError> {
        let task = self.board.start_work(id, &self.identity)?;
        self.publish_status(&task, TaskStatus::Claimed);
        Ok(task)
    }

    /// Block a task this worker holds
    pub fn block(&self, id: &str, reason: &str) -> Result<Task, CoordError> {
        let task = self.board.block_as(id, &self.identity, reason)?;
        let from = task.blocked_from.unwrap_or(TaskStatus::Working);
        self.publish_status(&task, from);
        Ok(task)
    }

    pub fn unblock(&self, id: &str) -> Result<Task, CoordError> {
        let task = self.board.unblock(id)?;
        self.publish_status(&task, TaskStatus::Blocked);
        Ok(task)
    }

    /// Report progress on a task this worker holds
    ///
    /// `Done` and `Failed` submit the task for review, first starting it if
    /// it is still CLAIMED. `notes` become the result summary, the error
    /// details or the block reason respectively. A task assigned to another
    /// worker is rejected with `InvalidTransition`.
    pub fn report(&self, task_id: &str, report: Report, notes: &str) -> Result<Task, CoordError> {
        let outcome = match report {
            Report::Blocked => return self.block(task_id, notes),
            Report::Done => Outcome::Success,
            Report::Failed => Outcome::Failure,
        };

        let (prior, task) = self.board.submit_as(task_id, &self.identity, outcome, notes)?;
        if prior == TaskStatus::Claimed {
            self.publish_change(&task.id, TaskStatus::Claimed, TaskStatus::Working);
        }
        self.publish_status(&task, TaskStatus::Working);
        info!(task_id, report = %report, worker = %self.identity, "task reported");
        Ok(task)
    }

    /// Reviewer decision on a task awaiting review
    pub fn review(&self, task_id: &str, outcome: Outcome, notes: Option<&str>) -> Result<Task, CoordError> {
        let task = self.board.finalize(task_id, outcome, notes)?;
        self.publish_status(&task, TaskStatus::CompletedPendingReview);
        Ok(task)
    }

    /// Archive finished tasks, publishing one event per archived task
    pub fn archive(&self) -> Result<Vec<Task>, CoordError> {
        let archived = self.board.archive_finished()?;
        for task in &archived {
            self.bus.publish(
                topics::TASK_ARCHIVED,
                payload! { "taskId" => task.id, "status" => task.status.as_str() },
                Some(task.id.clone()),
            );
        }
        Ok(archived)
    }

    fn publish_claim(&self, task: &Task) {
        self.bus.publish(
            topics::TASK_CLAIMED,
            payload! { "taskId" => task.id, "worker" => self.identity },
            Some(task.id.clone()),
        );
        self.publish_status(task, TaskStatus::Pending);
    }

    fn publish_status(&self, task: &Task, from: TaskStatus) {
        self.publish_change(&task.id, from, task.status);
    }

    fn publish_change(&self, task_id: &str, from: TaskStatus, to: TaskStatus) {
        self.bus.publish(
            topics::TASK_STATUS_CHANGED,
            payload! {
                "taskId" => task_id,
                "from" => from.as_str(),
                "to" => to.as_str(),
                "worker" => self.identity,
            },
            Some(task_id.to_string()),
        );
    }

    // ---- messages -------------------------------------------------------

    pub fn send(
        &self,
        to: &str,
        subject: &str,
        body: impl Into<serde_json::Value>,
        message_type: MessageType,
    ) -> Result<Uuid, CoordError> {
        self.send_draft(to, MessageDraft::new(subject, body).with_type(message_type))
    }

    /// Deliver a prepared draft; resending an id already delivered to `to`
    /// writes and publishes nothing
    pub fn send_draft(&self, to: &str, draft: MessageDraft) -> Result<Uuid, CoordError> {
        let message_type = draft.message_type;
        let id = match self.mailbox.deliver(to, draft)? {
            Delivery::Delivered(id) => id,
            Delivery::Duplicate(id) => return Ok(id),
        };
        self.bus.publish(
            topics::MESSAGE_SENT,
            payload! {
                "messageId" => id.to_string(),
                "from" => self.identity,
                "to" => to,
                "type" => message_type.as_str(),
            },
            Some(id.to_string()),
        );
        Ok(id)
    }

    /// Up to the configured batch size of pending messages, oldest first
    ///
    /// Messages stay pending until [`acknowledge`](Self::acknowledge)d.
    pub fn poll_inbox(&self) -> Result<Vec<Message>, CoordError> {
        let batch = self.mailbox.poll_batch(self.batch_size)?;

        for path in &batch.quarantined {
            self.bus.publish(
                topics::MESSAGE_QUARANTINED,
                payload! { "owner" => self.identity, "file" => path.display().to_string() },
                None,
            );
        }
        for message in &batch.messages {
            self.bus.publish(
                topics::MESSAGE_RECEIVED,
                payload! {
                    "messageId" => message.message_id.to_string(),
                    "from" => message.sender_id,
                    "to" => self.identity,
                },
                Some(message.message_id.to_string()),
            );
        }
        Ok(batch.messages)
    }

    pub fn acknowledge(&self, message_id: Uuid, outcome: AckOutcome) -> Result<AckResult, CoordError> {
        let result = self.mailbox.acknowledge(message_id, outcome)?;
        if let AckResult::Moved { .. } = result {
            let outcome = match outcome {
                AckOutcome::Handled => "handled",
                AckOutcome::Failed => "failed",
            };
            self.bus.publish(
                topics::MESSAGE_ACKNOWLEDGED,
                payload! {
                    "messageId" => message_id.to_string(),
                    "worker" => self.identity,
                    "outcome" => outcome,
                },
                Some(message_id.to_string()),
            );
        }
        Ok(result)
    }
}
