//! Crash-safe file primitives shared by the board and the mailbox
//!
//! - **Atomic writes**: write-temp-then-rename so readers never observe a
//!   partially written file
//! - **File locking**: advisory exclusive locks with a bounded wait
//! - **Error taxonomy**: [`CoordError`] with retryability classification
//!
//! # Example
//!
//! ```rust,no_run
//! use agent_coord_core::io::{acquire_lock, read_file, write_atomic, DEFAULT_LOCK_TIMEOUT};
//! use std::path::Path;
//!
//! let path = Path::new("/shared/coord/boards/main.json");
//! let _guard = acquire_lock(&path.with_extension("json.lock"), DEFAULT_LOCK_TIMEOUT)?;
//! let current = read_file(path)?.unwrap_or_else(|| b"{\"tasks\":{}}".to_vec());
//! write_atomic(path, &current)?;
//! # Ok::<(), agent_coord_core::io::CoordError>(())
//! ```

pub mod atomic;
pub mod error;
pub mod lock;

// Re-export primary API
pub use atomic::{append_line, read_file, write_atomic};
pub use error::CoordError;
pub use lock::{acquire_lock, FileLock, DEFAULT_LOCK_TIMEOUT};
