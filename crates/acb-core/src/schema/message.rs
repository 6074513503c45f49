//! Mailbox message schema

use super::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Message type tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Task handoff or task-related instruction
    Task,
    /// Progress or status report
    Status,
    Request,
    Response,
    #[default]
    Notification,
    /// Review request or review verdict
    Review,
    /// Any tag this version does not know
    #[serde(other)]
    Other,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Task => "task",
            MessageType::Status => "status",
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Notification => "notification",
            MessageType::Review => "review",
            MessageType::Other => "other",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
            .map_err(|e| e.to_string())
    }
}

/// A delivered message, one per file in a mailbox directory
///
/// Messages are immutable once written to a recipient's `inbox/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: Uuid,

    pub sender_id: String,

    pub recipient_id: String,

    /// UTC send time
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub subject: String,

    #[serde(rename = "type", default)]
    pub message_type: MessageType,

    /// Plain string or structured payload
    #[serde(default)]
    pub body: serde_json::Value,

    #[serde(default)]
    pub priority: Priority,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub extra_fields: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Body as text when it is a JSON string
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_str()
    }
}

/// Caller-supplied content of a message before sending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDraft {
    /// Explicit id; a UUID v4 is assigned when absent
    pub message_id: Option<Uuid>,
    pub subject: String,
    pub message_type: MessageType,
    pub body: serde_json::Value,
    pub priority: Priority,
}

impl MessageDraft {
    pub fn new(subject: impl Into<String>, body: impl Into<serde_json::Value>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
