//! Configuration discovery and resolution

use super::types::Config;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Repo-local config file name
pub const REPO_CONFIG_FILE: &str = ".acb.toml";

/// Global config location relative to the home directory
pub const GLOBAL_CONFIG_PATH: &str = ".config/acb/config.toml";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Merged layers do not form a valid configuration
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid {key} '{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub identity: Option<String>,
    pub root: Option<PathBuf>,
    pub board: Option<String>,
    pub lock_timeout_ms: Option<u64>,
    /// Explicit config file, read in place of the repo-local one
    pub config_path: Option<PathBuf>,
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides
/// 2. Environment variables (`ACB_IDENTITY`, `ACB_ROOT`, `ACB_BOARD`,
///    `ACB_LOCK_TIMEOUT_MS`)
/// 3. Repo-local config (`.acb.toml` in current dir or a parent, up to the
///    git root), or `overrides.config_path` when given
/// 4. Global config (`<home>/.config/acb/config.toml`)
/// 5. Defaults
///
/// File layers merge key by key, so a file that sets only `[board] name`
/// keeps every other value from the layers below it. An unparsable global or
/// repo file is skipped with a warning; an explicit `config_path` that
/// cannot be read is an error.
pub fn resolve_config(
    overrides: &ConfigOverrides,
    current_dir: &Path,
    home_dir: &Path,
) -> Result<Config, ConfigError> {
    let mut merged = toml::Table::new();

    let global_config_path = home_dir.join(GLOBAL_CONFIG_PATH);
    if global_config_path.exists() {
        match load_table(&global_config_path) {
            Ok(table) => merge_tables(&mut merged, table),
            Err(e) => warn!("Skipping global config: {e}"),
        }
    }

    if let Some(ref explicit) = overrides.config_path {
        merge_tables(&mut merged, load_table(explicit)?);
    } else if let Some(repo_config) = find_repo_local_config(current_dir) {
        match load_table(&repo_config) {
            Ok(table) => merge_tables(&mut merged, table),
            Err(e) => warn!("Skipping repo config: {e}"),
        }
    }

    let mut config: Config = toml::Value::Table(merged).try_into()?;

    apply_env_overrides(&mut config)?;
    apply_cli_overrides(&mut config, overrides);
    config.validate()?;

    debug!(
        identity = %config.core.identity,
        board = %config.board.name,
        "configuration resolved"
    );
    Ok(config)
}

/// Find repo-local config file
///
/// Searches current directory and parent directories up to git root
pub fn find_repo_local_config(current_dir: &Path) -> Option<PathBuf> {
    let mut dir = current_dir;

    loop {
        let config_path = dir.join(REPO_CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if dir.join(".git").exists() {
            break;
        }

        dir = dir.parent()?;
    }

    None
}

fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    contents.parse::<toml::Table>().map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Overlay `upper` onto `base`; nested tables merge, other values replace
fn merge_tables(base: &mut toml::Table, upper: toml::Table) {
    for (key, value) in upper {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Some(identity) = non_empty_env("ACB_IDENTITY") {
        config.core.identity = identity;
    }

    if let Some(root) = non_empty_env("ACB_ROOT") {
        config.core.root = Some(PathBuf::from(root));
    }

    if let Some(board) = non_empty_env("ACB_BOARD") {
        config.board.name = board;
    }

    if let Some(raw) = non_empty_env("ACB_LOCK_TIMEOUT_MS") {
        config.board.lock_timeout_ms = raw.parse().map_err(|_| ConfigError::InvalidEnv {
            var: "ACB_LOCK_TIMEOUT_MS",
            value: raw.clone(),
        })?;
    }

    Ok(())
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn apply_cli_overrides(config: &mut Config, overrides: &ConfigOverrides) {
    if let Some(ref identity) = overrides.identity {
        config.core.identity = identity.clone();
    }

    if let Some(ref root) = overrides.root {
        config.core.root = Some(root.clone());
    }

    if let Some(ref board) = overrides.board {
        config.board.name = board.clone();
    }

    if let Some(timeout) = overrides.lock_timeout_ms {
        config.board.lock_timeout_ms = timeout;
    }
}
