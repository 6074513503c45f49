//! Topic taxonomy
//!
//! Topics are dot-separated, `category.action` or `category.subject.action`.
//! Subscribers match them with patterns; see [`super::topic_matches`].

pub const TASK_CREATED: &str = "task.created";
pub const TASK_UPDATED: &str = "task.updated";
pub const TASK_CLAIMED: &str = "task.claimed";
pub const TASK_STATUS_CHANGED: &str = "task.status.changed";
pub const TASK_ARCHIVED: &str = "task.archived";

pub const MESSAGE_SENT: &str = "message.sent";
pub const MESSAGE_RECEIVED: &str = "message.received";
pub const MESSAGE_ACKNOWLEDGED: &str = "message.acknowledged";
pub const MESSAGE_QUARANTINED: &str = "message.quarantined";

/// Every topic this crate publishes
pub const ALL: [&str; 9] = [
    TASK_CREATED,
    TASK_UPDATED,
    TASK_CLAIMED,
    TASK_STATUS_CHANGED,
    TASK_ARCHIVED,
    MESSAGE_SENT,
    MESSAGE_RECEIVED,
    MESSAGE_ACKNOWLEDGED,
    MESSAGE_QUARANTINED,
];
