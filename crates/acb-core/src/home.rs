//! Home directory resolution
//!
//! Every path derived from "home" (global config, default coordination root)
//! goes through [`get_home_dir`], so deployments and tests can relocate all of
//! it with one variable.
//!
//! # Precedence
//!
//! 1. `ACB_HOME` environment variable (if set and non-blank, trimmed)
//! 2. `dirs::home_dir()` platform default
//!
//! # Testing
//!
//! Integration tests MUST set `ACB_HOME` rather than touching the real home:
//!
//! ```ignore
//! use assert_cmd::Command;
//! use tempfile::TempDir;
//!
//! let temp_dir = TempDir::new().unwrap();
//! let mut cmd = Command::cargo_bin("acb").unwrap();
//! cmd.env("ACB_HOME", temp_dir.path());
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable overriding the home directory
pub const HOME_ENV: &str = "ACB_HOME";

/// Home directory for all coordination state and configuration
///
/// # Errors
///
/// Fails only when `ACB_HOME` is unset and the platform home directory
/// cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().context("Could not determine home directory")
}

/// Default coordination root: `<home>/.acb`
pub fn default_root(home: &std::path::Path) -> PathBuf {
    home.join(".acb")
}
