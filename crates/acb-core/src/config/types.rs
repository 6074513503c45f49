//! Configuration types

use super::discovery::ConfigError;
use crate::events::JournalConfig;
use crate::home::default_root;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Core configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Worker identity; names the mailbox and becomes the task assignee
    pub identity: String,
    /// Shared coordination directory (default: `<home>/.acb`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            identity: "human".to_string(),
            root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Board name; the file is `<root>/boards/<name>.json`
    pub name: String,
    /// How long a mutation waits for the board lock
    pub lock_timeout_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "main".to_string(),
            lock_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Maximum messages returned by one inbox poll
    pub batch_size: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Append every published event to a JSONL journal
    pub journal: bool,
    /// Journal location (default: `<root>/events.jsonl`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,
    pub max_bytes: u64,
    pub max_files: u32,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            journal: false,
            journal_path: None,
            max_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl Config {
    /// Reject values that would be unsafe to turn into paths
    ///
    /// The board name and identity become single file or directory names
    /// under the coordination root.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("board.name", &self.board.name),
            ("core.identity", &self.core.identity),
        ] {
            if !is_single_component(value) {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: value.clone(),
                    reason: "must be a non-empty name without path separators",
                });
            }
        }
        Ok(())
    }

    /// Coordination root; relative `core.root` values resolve against `home`
    pub fn root(&self, home: &Path) -> PathBuf {
        match &self.core.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => home.join(root),
            None => default_root(home),
        }
    }

    pub fn board_path(&self, home: &Path) -> PathBuf {
        self.root(home)
            .join("boards")
            .join(format!("{}.json", self.board.name))
    }

    pub fn mail_root(&self, home: &Path) -> PathBuf {
        self.root(home).join("mail")
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.board.lock_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Journal settings when `events.journal` is enabled
    pub fn journal_config(&self, home: &Path) -> Option<JournalConfig> {
        if !self.events.journal {
            return None;
        }
        let path = self
            .events
            .journal_path
            .clone()
            .unwrap_or_else(|| self.root(home).join("events.jsonl"));
        Some(JournalConfig {
            path,
            max_bytes: self.events.max_bytes.max(1),
            max_files: self.events.max_files.max(1),
        })
    }
}

fn is_single_component(name: &str) -> bool {
    !(name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.core.identity, "human");
        assert_eq!(config.board.name, "main");
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.mailbox.batch_size, 50);
        assert!(config.journal_config(Path::new("/h")).is_none());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_derived_paths() {
        let home = Path::new("/home/w1");
        let mut config = Config::default();
        assert_eq!(config.board_path(home), PathBuf::from("/home/w1/.acb/boards/main.json"));
        assert_eq!(config.mail_root(home), PathBuf::from("/home/w1/.acb/mail"));

        config.core.root = Some(PathBuf::from("/shared/coord"));
        config.board.name = "release".to_string();
        assert_eq!(config.board_path(home), PathBuf::from("/shared/coord/boards/release.json"));

        config.core.root = Some(PathBuf::from("team"));
        assert_eq!(config.mail_root(home), PathBuf::from("/home/w1/team/mail"));
    }

    #[test]
    fn test_validate_rejects_path_like_names() {
        assert!(Config::default().validate().is_ok());

        for bad in ["../../x", "a/b", "a\\b", "..", "", "  "] {
            let mut config = Config::default();
            config.board.name = bad.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidValue { key: "board.name", .. })),
                "{bad:?} accepted"
            );
        }

        let mut config = Config::default();
        config.core.identity = "../w1".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let toml_str = r#"
[core]
identity = "builder-1"

[board]
lock_timeout_ms = 250

[events]
journal = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.core.identity, "builder-1");
        assert_eq!(config.board.name, "main");
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));

        let journal = config.journal_config(Path::new("/h")).unwrap();
        assert_eq!(journal.path, PathBuf::from("/h/.acb/events.jsonl"));
        assert_eq!(journal.max_files, 5);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }
}
