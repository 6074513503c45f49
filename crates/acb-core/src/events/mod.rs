//! In-process event bus
//!
//! Synchronous publish/subscribe with hierarchical topics. Nothing is
//! persisted and nothing crosses a process boundary; subscribe an
//! [`EventJournal`] for a durable trail.
//!
//! ## Pattern grammar
//!
//! - `*` alone matches every topic
//! - a `*` segment matches exactly one segment, except as the final segment
//!   where it matches one or more (`task.*` matches `task.status.changed`)
//! - any other segment matches literally
//!
//! ## Example
//!
//! ```rust
//! use agent_coord_core::events::{topics, EventBus};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let bus = EventBus::new("worker-1");
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = seen.clone();
//! bus.subscribe("task.*", move |_event| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! bus.publish(topics::TASK_STATUS_CHANGED, serde_json::Map::new(), Some("t1".into()));
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

mod journal;
pub mod topics;

pub use journal::{EventJournal, JournalConfig};

use crate::schema::Event;
use serde_json::{Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    pattern: String,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

/// Cloneable bus handle; clones share one subscriber registry
#[derive(Clone)]
pub struct EventBus {
    source_id: String,
    registry: Arc<Registry>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("source_id", &self.source_id)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// Create a bus whose events carry `source_id`
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            registry: Arc::new(Registry::default()),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Register `handler` for topics matching `pattern`
    ///
    /// Handlers run in registration order on the publishing thread.
    pub fn subscribe<F>(&self, pattern: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let pattern = pattern.into();
        debug!(subscription = id.0, pattern = %pattern, "subscribed");

        let mut subs = match self.registry.subscriptions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.push(Subscription {
            id,
            pattern,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a subscription; returns `false` if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = match self.registry.subscriptions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        let removed = subs.len() != before;
        if removed {
            debug!(subscription = id.0, "unsubscribed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        match self.registry.subscriptions.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Build an event and deliver it to every matching subscriber
    ///
    /// Handler errors and panics are logged and never reach the publisher.
    /// The subscriber list is snapshotted first, so handlers may subscribe
    /// or publish without deadlocking.
    pub fn publish(
        &self,
        topic: &str,
        payload: Map<String, Value>,
        correlation_id: Option<String>,
    ) -> Event {
        let event = Event::new(topic, self.source_id.clone(), payload, correlation_id);
        self.dispatch(&event);
        event
    }

    /// Deliver an already-built event
    pub fn dispatch(&self, event: &Event) {
        let handlers: Vec<(SubscriptionId, Handler)> = {
            let subs = match self.registry.subscriptions.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            subs.iter()
                .filter(|s| topic_matches(&s.pattern, &event.topic))
                .map(|s| (s.id, s.handler.clone()))
                .collect()
        };

        debug!(topic = %event.topic, handlers = handlers.len(), "publishing event");

        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    subscription = id.0,
                    topic = %event.topic,
                    event_id = %event.event_id,
                    error = %e,
                    "event handler failed"
                ),
                Err(panic) => warn!(
                    subscription = id.0,
                    topic = %event.topic,
                    event_id = %event.event_id,
                    panic = panic_message(panic.as_ref()),
                    "event handler panicked"
                ),
            }
        }
    }
}

/// Whether `topic` matches subscription `pattern`
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let pattern: Vec<&str> = pattern.split('.').collect();
    let topic: Vec<&str> = topic.split('.').collect();

    for (i, segment) in pattern.iter().enumerate() {
        let last = i + 1 == pattern.len();
        match (*segment, topic.get(i)) {
            (_, None) => return false,
            ("*", Some(_)) if last => return true,
            ("*", Some(_)) => continue,
            (literal, Some(actual)) if literal == *actual => continue,
            _ => return false,
        }
    }
    pattern.len() == topic.len()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Build an event payload from `key => value` pairs
#[macro_export]
macro_rules! payload {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = ::serde_json::Map::new();
        $( map.insert(::std::string::String::from($key), ::serde_json::json!($value)); )*
        map
    }};
}
