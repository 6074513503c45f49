//! Advisory file locking with timeout

use crate::io::error::CoordError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default time to wait for a board lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const MAX_BACKOFF: Duration = Duration::from_millis(800);

/// File lock guard that automatically releases on drop
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Path of the lock file held by this guard
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well; unlock explicitly
        // so the release is not tied to when the File is dropped.
        let _ = FileExt::unlock(&self.file);
        debug!(lock = %self.path.display(), "released lock");
    }
}

/// Acquire an exclusive advisory lock on `path`, waiting at most `timeout`
///
/// The lock file is created if missing and is never removed; it carries no
/// data. Contention is retried with exponential backoff:
/// 50ms, 100ms, 200ms, 400ms, then 800ms per attempt, each wait clipped to
/// the remaining time.
///
/// # Errors
///
/// Returns `CoordError::LockTimeout` when the lock is still held elsewhere
/// after `timeout`, or `CoordError::Io` for any other failure.
pub fn acquire_lock(path: &Path, timeout: Duration) -> Result<FileLock, CoordError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| CoordError::io(parent, e))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| CoordError::io(path, e))?;

    let started = Instant::now();
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(lock = %path.display(), waited_ms = started.elapsed().as_millis() as u64, "acquired lock");
                return Ok(FileLock {
                    file,
                    path: path.to_path_buf(),
                });
            }
            Err(e) if is_contended(&e) => {}
            Err(e) => return Err(CoordError::io(path, e)),
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(CoordError::LockTimeout {
                path: path.to_path_buf(),
                waited: elapsed,
            });
        }

        std::thread::sleep(backoff.min(timeout - elapsed));
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_lock_success() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("board.json.lock");

        let lock = acquire_lock(&lock_path, DEFAULT_LOCK_TIMEOUT).unwrap();
        assert!(lock_path.exists());
        assert_eq!(lock.path(), lock_path.as_path());
    }

    #[test]
    fn test_acquire_lock_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("nested/boards/board.json.lock");

        let _lock = acquire_lock(&lock_path, DEFAULT_LOCK_TIMEOUT).unwrap();
        assert!(lock_path.exists());
    }

    #[test]
    fn test_lock_auto_release() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("test.lock");

        {
            let _lock = acquire_lock(&lock_path, DEFAULT_LOCK_TIMEOUT).unwrap();
        }

        // Released on drop, so a zero timeout succeeds immediately
        let _lock2 = acquire_lock(&lock_path, Duration::ZERO).unwrap();
    }

    #[test]
    fn test_acquire_lock_waits_for_holder() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = Arc::new(temp_dir.path().join("test.lock"));
        let barrier = Arc::new(Barrier::new(2));

        let holder_path = Arc::clone(&lock_path);
        let holder_barrier = Arc::clone(&barrier);
        let holder = thread::spawn(move || {
            let _lock = acquire_lock(&holder_path, DEFAULT_LOCK_TIMEOUT).unwrap();
            holder_barrier.wait();
            thread::sleep(Duration::from_millis(100));
        });

        barrier.wait();
        let result = acquire_lock(&lock_path, Duration::from_secs(3));
        holder.join().unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_acquire_lock_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = Arc::new(temp_dir.path().join("test.lock"));
        let barrier = Arc::new(Barrier::new(2));

        let holder_path = Arc::clone(&lock_path);
        let holder_barrier = Arc::clone(&barrier);
        let holder = thread::spawn(move || {
            let _lock = acquire_lock(&holder_path, DEFAULT_LOCK_TIMEOUT).unwrap();
            holder_barrier.wait();
            thread::sleep(Duration::from_millis(800));
        });

        barrier.wait();
        let started = Instant::now();
        let result = acquire_lock(&lock_path, Duration::from_millis(150));
        assert!(matches!(result, Err(CoordError::LockTimeout { .. })));
        assert!(started.elapsed() < Duration::from_millis(700));

        holder.join().unwrap();
    }
}
