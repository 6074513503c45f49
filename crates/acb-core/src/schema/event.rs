//! In-process event record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An event published on the in-process bus
///
/// Events are not persisted by the bus. Subscribers that need a durable
/// record (see `events::EventJournal`) serialize them themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_id: Uuid,

    /// Hierarchical dot-separated topic, e.g. `task.status.changed`
    pub topic: String,

    /// Identity of the publishing worker
    pub source_id: String,

    #[serde(default)]
    pub payload: Map<String, Value>,

    pub timestamp: DateTime<Utc>,

    /// Links related events (e.g. every event about one task)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Event {
    pub fn new(
        topic: impl Into<String>,
        source_id: impl Into<String>,
        payload: Map<String, Value>,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            topic: topic.into(),
            source_id: source_id.into(),
            payload,
            timestamp: Utc::now(),
            correlation_id,
        }
    }

    /// String payload field, if present
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}
