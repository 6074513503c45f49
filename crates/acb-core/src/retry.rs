//! Caller-side retry with bounded exponential backoff
//!
//! Core operations never retry on their own. A caller that wants to ride out
//! lock contention or a transient I/O failure wraps the call:
//!
//! ```rust,no_run
//! use agent_coord_core::board::TaskBoard;
//! use agent_coord_core::retry::RetryPolicy;
//!
//! let board = TaskBoard::open("/shared/coord/boards/main.json");
//! let task = RetryPolicy::default().run("claim_next", || board.claim_next("worker-1", None))?;
//! # Ok::<(), agent_coord_core::io::CoordError>(())
//! ```

use crate::io::CoordError;
use std::thread;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least 1
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `f`, retrying errors that [`CoordError::is_retryable`] accepts
    ///
    /// Non-retryable errors and the final failure are returned unchanged.
    pub fn run<T, F>(&self, op_name: &str, mut f: F) -> Result<T, CoordError>
    where
        F: FnMut() -> Result<T, CoordError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        op = op_name,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error_kind = e.kind(),
                        error = %e,
                        "retrying after transient failure"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
