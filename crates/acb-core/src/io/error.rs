//! Error taxonomy for board, mailbox and file store operations

use crate::schema::TaskStatus;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during coordination operations
#[derive(Error, Debug)]
pub enum CoordError {
    /// Failed to acquire the advisory lock before the timeout elapsed
    #[error("Failed to acquire lock on {path} within {waited:?}")]
    LockTimeout { path: PathBuf, waited: Duration },

    /// A task with the supplied id already exists on the board
    #[error("Task '{id}' already exists")]
    DuplicateTask { id: String },

    /// No task with this id exists on the board
    #[error("Task '{id}' not found")]
    TaskNotFound { id: String },

    /// The requested action is not an edge of the task state machine
    #[error("Cannot {action} task '{id}' from {from}: {reason}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        action: &'static str,
        reason: String,
    },

    /// A field update was rejected (e.g. attempt to change the id)
    #[error("Invalid update for task '{id}': {reason}")]
    InvalidUpdate { id: String, reason: String },

    /// A mailbox file failed validation and was quarantined
    #[error("Message schema error in {path}: {reason}")]
    MessageSchema { path: PathBuf, reason: String },

    /// The board file parsed but violates board invariants
    #[error("Corrupt board file {path}: {reason}")]
    CorruptBoard { path: PathBuf, reason: String },

    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse or serialize JSON
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl CoordError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoordError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        CoordError::Json {
            path: path.into(),
            source,
        }
    }

    /// Stable tag used as the `error_kind` field of structured log lines
    pub fn kind(&self) -> &'static str {
        match self {
            CoordError::LockTimeout { .. } => "lock_timeout",
            CoordError::DuplicateTask { .. } => "duplicate_task",
            CoordError::TaskNotFound { .. } => "task_not_found",
            CoordError::InvalidTransition { .. } => "invalid_transition",
            CoordError::InvalidUpdate { .. } => "invalid_update",
            CoordError::MessageSchema { .. } => "message_schema",
            CoordError::CorruptBoard { .. } => "corrupt_board",
            CoordError::Io { .. } => "io",
            CoordError::Json { .. } => "json",
        }
    }

    /// Task id the error concerns, for structured logs
    pub fn task_id(&self) -> Option<&str> {
        match self {
            CoordError::DuplicateTask { id }
            | CoordError::TaskNotFound { id }
            | CoordError::InvalidTransition { id, .. }
            | CoordError::InvalidUpdate { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Only environment failures qualify. Caller logic errors need a changed
    /// request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordError::LockTimeout { .. } | CoordError::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = CoordError::LockTimeout {
            path: PathBuf::from("board.json.lock"),
            waited: Duration::from_millis(10),
        };
        assert!(timeout.is_retryable());
        assert_eq!(timeout.kind(), "lock_timeout");
        assert_eq!(timeout.task_id(), None);

        let io = CoordError::io("board.json", std::io::Error::other("disk gone"));
        assert!(io.is_retryable());

        let dup = CoordError::DuplicateTask { id: "t1".into() };
        assert!(!dup.is_retryable());

        let transition = CoordError::InvalidTransition {
            id: "t1".into(),
            from: TaskStatus::Completed,
            action: "claim",
            reason: "task is not pending".into(),
        };
        assert!(!transition.is_retryable());
        assert_eq!(transition.kind(), "invalid_transition");
        assert_eq!(transition.task_id(), Some("t1"));
    }

    #[test]
    fn test_transition_message_names_state() {
        let err = CoordError::InvalidTransition {
            id: "t9".into(),
            from: TaskStatus::Working,
            action: "claim",
            reason: "task is not pending".into(),
        };
        let text = err.to_string();
        assert!(text.contains("t9"));
        assert!(text.contains("WORKING"));
    }
}
