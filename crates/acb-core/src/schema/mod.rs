//! Schema types for boards, mailboxes and events
//!
//! Persisted types (`Task`, `BoardFile`, `Message`) preserve unknown fields
//! for forward compatibility.

mod event;
mod message;
mod priority;
mod task;

pub use event::Event;
pub use message::{Message, MessageDraft, MessageType};
pub use priority::Priority;
pub use task::{
    BoardFile, NewTask, Task, TaskStatus, TaskUpdate, BOARD_SCHEMA_VERSION, RESERVED_TASK_KEYS,
};
