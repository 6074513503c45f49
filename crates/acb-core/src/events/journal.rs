//! JSONL event journal with size-based rotation

use super::EventBus;
use crate::io::{append_line, CoordError};
use crate::schema::Event;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_FILES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalConfig {
    pub path: PathBuf,
    /// Rotate once the active file reaches this size
    pub max_bytes: u64,
    /// Rotated files kept as `path.1 ..= path.N`
    pub max_files: u32,
}

impl JournalConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

/// Appends every event it receives to a JSONL file
///
/// Appends from one process are serialized by an internal mutex. The
/// journal is a diagnostic trail, not part of the coordination protocol.
#[derive(Debug, Clone)]
pub struct EventJournal {
    config: JournalConfig,
    write_guard: Arc<Mutex<()>>,
}

impl EventJournal {
    pub fn new(config: JournalConfig) -> Self {
        Self {
            config,
            write_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Subscribe this journal to every topic on `bus`
    pub fn attach(&self, bus: &EventBus) -> super::SubscriptionId {
        let journal = self.clone();
        bus.subscribe("*", move |event| {
            journal.record(event)?;
            Ok(())
        })
    }

    /// Append one event, rotating first if the file is full
    pub fn record(&self, event: &Event) -> Result<(), CoordError> {
        let _guard = match self.write_guard.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let path = &self.config.path;
        rotate_if_needed(path, self.config.max_bytes, self.config.max_files)?;

        let line = serde_json::to_vec(event).map_err(|e| CoordError::json(path, e))?;
        append_line(path, &line)
    }

    /// Events in the active file, oldest first; unparsable lines are skipped
    pub fn read_all(&self) -> Result<Vec<Event>, CoordError> {
        let path = &self.config.path;
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoordError::io(path, e)),
        };
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

pub(crate) fn rotated_path(path: &Path, idx: u32) -> PathBuf {
    PathBuf::from(format!("{}.{}", path.display(), idx))
}

fn rotate_if_needed(path: &Path, max_bytes: u64, max_files: u32) -> Result<(), CoordError> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(CoordError::io(path, e)),
    };
    if len < max_bytes {
        return Ok(());
    }

    // Oldest falls off the end when path.N is overwritten
    for idx in (1..max_files.max(1)).rev() {
        let src = rotated_path(path, idx);
        if src.exists() {
            let dst = rotated_path(path, idx + 1);
            fs::rename(&src, &dst).map_err(|e| CoordError::io(&src, e))?;
        }
    }
    let first = rotated_path(path, 1);
    fs::rename(path, &first).map_err(|e| CoordError::io(path, e))?;
    debug!(path = %path.display(), bytes = len, "rotated event journal");
    Ok(())
}
