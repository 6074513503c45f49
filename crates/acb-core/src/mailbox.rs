//! Per-agent file mailboxes
//!
//! Each agent owns a directory under a shared mail root:
//!
//! ```text
//! <mail_root>/<agent>/
//!   inbox/       - delivered, not yet acknowledged
//!   processed/   - acknowledged as handled
//!   error/       - acknowledged as failed, or quarantined as malformed
//! ```
//!
//! One message per file, named `<sortable-prefix>_<uuid>.json`. Delivery is an
//! atomic rename into `inbox/`, so a reader sees a message fully or not at
//! all. Acknowledgement moves the file out of `inbox/` by hard link plus
//! unlink; when two readers race, exactly one unlink succeeds and the other
//! reports [`AckResult::AlreadyHandled`]. Nothing already in `processed/` or
//! `error/` is ever replaced.

use crate::io::atomic::is_temp_name;
use crate::io::{write_atomic, CoordError};
use crate::schema::{Message, MessageDraft};
use chrono::Utc;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const INBOX_DIR: &str = "inbox";
pub const PROCESSED_DIR: &str = "processed";
pub const ERROR_DIR: &str = "error";

/// Suffix of the note written next to a quarantined file
pub const NOTE_SUFFIX: &str = ".note";

/// How a received message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Move to `processed/`
    Handled,
    /// Move to `error/`
    Failed,
}

impl std::str::FromStr for AckOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "handled" | "processed" | "ok" => Ok(AckOutcome::Handled),
            "failed" | "error" => Ok(AckOutcome::Failed),
            other => Err(format!("unknown acknowledgement outcome '{other}'")),
        }
    }
}

/// Result of an acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckResult {
    /// This call moved the message out of `inbox/`
    Moved { destination: PathBuf },
    /// The message was no longer in `inbox/`; another reader handled it
    AlreadyHandled,
}

/// Result of a delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A new file was written to the recipient's inbox
    Delivered(Uuid),
    /// The recipient already holds this message id (pending or handled)
    Duplicate(Uuid),
}

impl Delivery {
    pub fn message_id(&self) -> Uuid {
        match self {
            Delivery::Delivered(id) | Delivery::Duplicate(id) => *id,
        }
    }
}

/// Outcome of one inbox scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollBatch {
    pub messages: Vec<Message>,
    /// Inbox files moved to `error/` during this scan
    pub quarantined: Vec<PathBuf>,
}

/// Mailbox handle for one agent identity
#[derive(Debug, Clone)]
pub struct Mailbox {
    root: PathBuf,
    owner: String,
}

impl Mailbox {
    /// Open `owner`'s mailbox under `root`, creating its directories
    pub fn open(root: impl Into<PathBuf>, owner: &str) -> Result<Self, CoordError> {
        validate_agent_id(owner)?;
        let mailbox = Self {
            root: root.into(),
            owner: owner.to_string(),
        };
        for dir in [mailbox.inbox_dir(), mailbox.processed_dir(), mailbox.error_dir()] {
            fs::create_dir_all(&dir).map_err(|e| CoordError::io(&dir, e))?;
        }
        Ok(mailbox)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.agent_dir(&self.owner).join(INBOX_DIR)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.agent_dir(&self.owner).join(PROCESSED_DIR)
    }

    pub fn error_dir(&self) -> PathBuf {
        self.agent_dir(&self.owner).join(ERROR_DIR)
    }

    fn agent_dir(&self, agent: &str) -> PathBuf {
        self.root.join(agent)
    }

    /// Deliver a message into `recipient`'s inbox, returning its id
    ///
    /// See [`deliver`](Self::deliver).
    pub fn send(&self, recipient: &str, draft: MessageDraft) -> Result<Uuid, CoordError> {
        Ok(self.deliver(recipient, draft)?.message_id())
    }

    /// Deliver a message into `recipient`'s inbox
    ///
    /// Assigns a UUID when the draft has none and stamps the sender and send
    /// time. A draft carrying an id the recipient already holds in `inbox/`,
    /// `processed/` or `error/` is not written again, so retrying a send
    /// with the same id leaves one copy.
    pub fn deliver(&self, recipient: &str, draft: MessageDraft) -> Result<Delivery, CoordError> {
        validate_agent_id(recipient)?;

        if let Some(id) = draft.message_id
            && let Some(existing) = self.find_delivered(recipient, id)?
        {
            info!(
                message_id = %id,
                to = recipient,
                existing = %existing.display(),
                "message already delivered"
            );
            return Ok(Delivery::Duplicate(id));
        }

        let message = Message {
            message_id: draft.message_id.unwrap_or_else(Uuid::new_v4),
            sender_id: self.owner.clone(),
            recipient_id: recipient.to_string(),
            timestamp: Utc::now(),
            subject: draft.subject,
            message_type: draft.message_type,
            body: draft.body,
            priority: draft.priority,
            extra_fields: Default::default(),
        };

        let path = self
            .agent_dir(recipient)
            .join(INBOX_DIR)
            .join(message_file_name(&message));
        let content = serde_json::to_vec_pretty(&message).map_err(|e| CoordError::json(&path, e))?;
        write_atomic(&path, &content)?;

        info!(
            message_id = %message.message_id,
            from = %self.owner,
            to = recipient,
            kind = %message.message_type,
            "message delivered"
        );
        Ok(Delivery::Delivered(message.message_id))
    }

    /// Every valid message currently in the inbox, oldest first
    ///
    /// Files that fail validation are quarantined into `error/` with a note
    /// and are not returned. Messages stay in the inbox until acknowledged,
    /// so calling this again re-reads unacknowledged messages.
    pub fn receive_all(&self) -> Result<Vec<Message>, CoordError> {
        Ok(self.poll_batch(usize::MAX)?.messages)
    }

    /// Like [`receive_all`](Self::receive_all) but returns at most `limit`
    /// messages
    pub fn poll(&self, limit: usize) -> Result<Vec<Message>, CoordError> {
        Ok(self.poll_batch(limit)?.messages)
    }

    /// [`poll`](Self::poll), also reporting which files were quarantined
    ///
    /// Scanning stops once the batch is full; files after that point are
    /// examined on a later poll.
    pub fn poll_batch(&self, limit: usize) -> Result<PollBatch, CoordError> {
        let mut batch = PollBatch::default();
        if limit == 0 {
            return Ok(batch);
        }

        for path in self.inbox_files()? {
            match self.parse_message(&path) {
                Ok(Some(message)) => {
                    batch.messages.push(message);
                    if batch.messages.len() >= limit {
                        break;
                    }
                }
                // Vanished between listing and reading: acknowledged elsewhere
                Ok(None) => continue,
                Err(CoordError::MessageSchema { reason, .. }) => {
                    if let Some(moved) = self.quarantine(&path, &reason)? {
                        batch.quarantined.push(moved);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            owner = %self.owner,
            count = batch.messages.len(),
            quarantined = batch.quarantined.len(),
            "inbox read"
        );
        Ok(batch)
    }

    /// Move a message out of the inbox
    ///
    /// `Handled` moves it to `processed/`, `Failed` to `error/`. The rename
    /// is the acknowledgement. A message no longer in the inbox yields
    /// `AlreadyHandled`, which is not an error.
    pub fn acknowledge(&self, message_id: Uuid, outcome: AckOutcome) -> Result<AckResult, CoordError> {
        let Some(source) = self.find_in_inbox(message_id)? else {
            debug!(message_id = %message_id, "acknowledge: not in inbox");
            return Ok(AckResult::AlreadyHandled);
        };

        let dest_dir = match outcome {
            AckOutcome::Handled => self.processed_dir(),
            AckOutcome::Failed => self.error_dir(),
        };
        let file_name = source.file_name().unwrap_or_default().to_os_string();

        match move_without_overwrite(&source, &dest_dir, &file_name)? {
            Some(destination) => {
                info!(message_id = %message_id, outcome = ?outcome, "message acknowledged");
                Ok(AckResult::Moved { destination })
            }
            None => {
                debug!(message_id = %message_id, "acknowledge lost race");
                Ok(AckResult::AlreadyHandled)
            }
        }
    }

    /// Number of message files waiting in the inbox
    pub fn pending_count(&self) -> Result<usize, CoordError> {
        Ok(self.inbox_files()?.len())
    }

    /// Files moved to `error/` (failed or quarantined), sorted
    ///
    /// Notes written beside quarantined files are not listed.
    pub fn quarantined(&self) -> Result<Vec<PathBuf>, CoordError> {
        let mut files: Vec<PathBuf> = visible_files(&self.error_dir())?
            .into_iter()
            .filter(|p| !is_note_for_sibling(p))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Every non-temp file in the inbox, well-formed or not
    fn inbox_files(&self) -> Result<Vec<PathBuf>, CoordError> {
        let mut files = visible_files(&self.inbox_dir())?;
        files.sort();
        Ok(files)
    }

    /// A file for `message_id` anywhere in `recipient`'s mailbox
    fn find_delivered(&self, recipient: &str, message_id: Uuid) -> Result<Option<PathBuf>, CoordError> {
        let suffix = format!("_{message_id}.json");
        let agent_dir = self.agent_dir(recipient);
        for dir in [INBOX_DIR, PROCESSED_DIR, ERROR_DIR] {
            let found = visible_files(&agent_dir.join(dir))?.into_iter().find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(&suffix))
            });
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    fn find_in_inbox(&self, message_id: Uuid) -> Result<Option<PathBuf>, CoordError> {
        Ok(self.inbox_files()?.into_iter().find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_message_file_name)
                == Some(message_id)
        }))
    }

    /// Parse and validate one inbox file; `Ok(None)` if it has vanished
    fn parse_message(&self, path: &Path) -> Result<Option<Message>, CoordError> {
        let schema_error = |reason: String| CoordError::MessageSchema {
            path: path.to_path_buf(),
            reason,
        };

        let Some(file_id) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_message_file_name)
        else {
            return Err(schema_error(
                "file name is not <20-digit timestamp>_<uuid>.json".to_string(),
            ));
        };

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoordError::io(path, e)),
        };

        let message: Message = serde_json::from_slice(&bytes)
            .map_err(|e| schema_error(format!("invalid message JSON: {e}")))?;

        if message.sender_id.trim().is_empty() {
            return Err(schema_error("senderId is empty".to_string()));
        }
        if message.recipient_id != self.owner {
            return Err(schema_error(format!(
                "addressed to '{}', not '{}'",
                message.recipient_id, self.owner
            )));
        }
        if message.message_id != file_id {
            return Err(schema_error(format!(
                "file name does not carry message id {}",
                message.message_id
            )));
        }
        Ok(Some(message))
    }

    /// Move a malformed inbox file to `error/` and leave a note beside it
    ///
    /// Earlier quarantined files with the same name are kept; the newcomer
    /// gets a unique prefix. Returns the new location, or `None` if the file
    /// had already gone.
    fn quarantine(&self, path: &Path, reason: &str) -> Result<Option<PathBuf>, CoordError> {
        let file_name = path.file_name().unwrap_or_default().to_os_string();
        let Some(destination) = move_without_overwrite(path, &self.error_dir(), &file_name)? else {
            return Ok(None);
        };

        let mut note_name = destination.file_name().unwrap_or_default().to_os_string();
        note_name.push(NOTE_SUFFIX);
        let note = format!(
            "quarantined_at: {}\nowner: {}\nreason: {}\n",
            Utc::now().to_rfc3339(),
            self.owner,
            reason
        );
        write_atomic(&self.error_dir().join(note_name), note.as_bytes())?;

        warn!(
            owner = %self.owner,
            file = %destination.display(),
            error_kind = "message_schema",
            reason,
            "quarantined malformed message"
        );
        Ok(Some(destination))
    }
}

/// `<20-digit UTC microseconds>_<uuid>.json`; sorts by send time
pub fn message_file_name(message: &Message) -> String {
    let micros = message.timestamp.timestamp_micros().max(0);
    format!("{micros:020}_{}.json", message.message_id)
}

/// Message id carried by a [`message_file_name`]; `None` for any other name
pub fn parse_message_file_name(name: &str) -> Option<Uuid> {
    let (prefix, rest) = name.strip_suffix(".json")?.split_once('_')?;
    if prefix.len() != 20 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id = Uuid::try_parse(rest).ok()?;
    (id.hyphenated().to_string() == rest).then_some(id)
}

/// Move `source` into `dir` without replacing a file already there
///
/// Tries `name`, then `<uuid>-<name>`. The hard link fails rather than
/// overwrite, and only the caller whose unlink of `source` succeeds keeps
/// its link, so concurrent movers of one file produce exactly one result.
/// Returns `None` when `source` disappeared first.
fn move_without_overwrite(source: &Path, dir: &Path, name: &OsStr) -> Result<Option<PathBuf>, CoordError> {
    let mut candidate = dir.join(name);
    loop {
        match fs::hard_link(source, &candidate) {
            Ok(()) => break,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => candidate = dir.join(unique_name(name)),
            Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => return Ok(None),
            Err(e) => {
                debug!(path = %source.display(), error = %e, "hard link unavailable, renaming");
                while candidate.exists() {
                    candidate = dir.join(unique_name(name));
                }
                return match fs::rename(source, &candidate) {
                    Ok(()) => Ok(Some(candidate)),
                    Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => Ok(None),
                    Err(e) => Err(CoordError::io(source, e)),
                };
            }
        }
    }

    match fs::remove_file(source) {
        Ok(()) => Ok(Some(candidate)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            // Another mover unlinked it first and owns the result
            fs::remove_file(&candidate).map_err(|e| CoordError::io(&candidate, e))?;
            Ok(None)
        }
        Err(e) => Err(CoordError::io(source, e)),
    }
}

fn unique_name(name: &OsStr) -> OsString {
    let mut unique = OsString::from(format!("{}-", Uuid::new_v4().simple()));
    unique.push(name);
    unique
}

/// Whether `path` is the note written for a sibling quarantined file
fn is_note_for_sibling(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.strip_suffix(NOTE_SUFFIX)
        .is_some_and(|stem| path.with_file_name(stem).exists())
}

/// Regular files in `dir` other than staged temp files
fn visible_files(dir: &Path) -> Result<Vec<PathBuf>, CoordError> {
    Ok(list_dir(dir)?
        .into_iter()
        .filter(|p| p.file_name().is_some_and(|n| !is_temp_name(&n.to_string_lossy())))
        .collect())
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, CoordError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CoordError::io(dir, e)),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CoordError::io(dir, e))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            paths.push(entry.path());
        }
    }
    Ok(paths)
}

/// Agent ids become directory names, so path syntax is rejected
fn validate_agent_id(agent: &str) -> Result<(), CoordError> {
    let bad = agent.trim().is_empty()
        || agent == "."
        || agent == ".."
        || agent.contains(['/', '\\'])
        || agent.contains('\0');
    if bad {
        return Err(CoordError::InvalidUpdate {
            id: agent.to_string(),
            reason: "agent id must be a non-empty single path component".to_string(),
        });
    }
    Ok(())
}
