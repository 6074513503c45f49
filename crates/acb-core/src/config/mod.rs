//! Configuration resolution
//!
//! Resolves configuration from multiple sources with priority:
//! 1. Command-line flags (passed as parameters)
//! 2. Environment variables
//! 3. Repo-local config (.acb.toml)
//! 4. Global config (~/.config/acb/config.toml)
//! 5. Defaults

mod discovery;
mod types;

pub use discovery::{
    find_repo_local_config, resolve_config, ConfigError, ConfigOverrides, GLOBAL_CONFIG_PATH,
    REPO_CONFIG_FILE,
};
pub use types::{BoardConfig, Config, CoreConfig, EventsConfig, MailboxConfig, RetryConfig};
