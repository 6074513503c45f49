//! Atomic whole-file writes and plain reads
//!
//! Writers stage content in a hidden temporary file next to the target and
//! rename it into place, so readers observe either the old file or the new
//! one, never a partial write.

use crate::io::error::CoordError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::debug;

/// Prefix of staged temp files; directory scans skip names starting with it
pub const TEMP_PREFIX: &str = ".";

/// Read a whole file
///
/// Returns `Ok(None)` when the file does not exist. Every other I/O failure
/// is surfaced.
pub fn read_file(path: &Path) -> Result<Option<Vec<u8>>, CoordError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoordError::io(path, e)),
    }
}

/// Atomically replace `path` with `content`
///
/// Creates parent directories as needed, writes a sibling temp file in the
/// same directory, fsyncs it and renames it over `path`. If any step fails
/// the original file is left untouched and the temp file is removed.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), CoordError> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir).map_err(|e| CoordError::io(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| CoordError::io(dir, e))?;

    tmp.write_all(content)
        .map_err(|e| CoordError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| CoordError::io(tmp.path(), e))?;

    // On error the returned NamedTempFile is dropped, which deletes it.
    tmp.persist(path).map_err(|e| CoordError::io(path, e.error))?;

    debug!(path = %path.display(), bytes = content.len(), "atomic write");
    Ok(())
}

/// Append one newline-terminated record to `path`, creating it if needed
///
/// Used for append-only logs (task archive, event journal). Callers that
/// need cross-process exclusion must hold the relevant lock.
pub fn append_line(path: &Path, line: &[u8]) -> Result<(), CoordError> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir).map_err(|e| CoordError::io(dir, e))?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CoordError::io(path, e))?;

    let mut record = Vec::with_capacity(line.len() + 1);
    record.extend_from_slice(line);
    record.push(b'\n');
    file.write_all(&record)
        .map_err(|e| CoordError::io(path, e))?;
    file.sync_data().map_err(|e| CoordError::io(path, e))?;
    Ok(())
}

/// Whether a directory entry name is a staged temp file from `write_atomic`
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
