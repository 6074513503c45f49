//! Core library for agent-coord (acb)
//!
//! File-based coordination for independent worker processes that share
//! nothing but a directory:
//!
//! - [`board`]: a task board with a lock-guarded, crash-safe state machine
//! - [`mailbox`]: per-worker inboxes with at-most-once acknowledgement
//! - [`events`]: an in-process publish/subscribe bus with topic patterns
//! - [`facade`]: the worker-facing [`Coordinator`] tying the three together
//!
//! All on-disk types:
//! - Preserve unknown fields for forward compatibility
//! - Are written by atomic rename, never in place
//! - Are validated on every load

pub mod board;
pub mod config;
pub mod events;
pub mod facade;
pub mod home;
pub mod io;
pub mod logging;
pub mod mailbox;
pub mod retry;
pub mod schema;

pub use board::{ClaimOutcome, Outcome, TaskBoard, TaskFilter};
pub use events::EventBus;
pub use facade::{Coordinator, Report};
pub use io::CoordError;
pub use mailbox::{AckOutcome, AckResult, Delivery, Mailbox};
pub use schema::{Event, Message, MessageDraft, MessageType, NewTask, Priority, Task, TaskStatus};
