//! CLI command dispatch and execution

use agent_coord_core::config::{resolve_config, Config, ConfigOverrides};
use agent_coord_core::facade::Coordinator;
use agent_coord_core::home::get_home_dir;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod mail;
mod output;
mod task;

/// acb - file-based task board and mailboxes for cooperating agents
#[derive(Parser, Debug)]
#[command(
    name = "acb",
    version,
    about = "File-based task board and mailboxes for cooperating agents",
    long_about = "Claim tasks, report progress and exchange messages with other workers \
                  through a shared coordination directory"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options accepted by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Act as this worker (default: ACB_IDENTITY or config identity)
    #[arg(long = "as", global = true, value_name = "WORKER")]
    identity: Option<String>,

    /// Coordination root directory (default: ACB_ROOT or ~/.acb)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Board name (default: ACB_BOARD or "main")
    #[arg(long, global = true)]
    board: Option<String>,

    /// Board lock timeout in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    lock_timeout_ms: Option<u64>,

    /// Read this config file instead of searching for .acb.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

impl GlobalArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            identity: self.identity.clone(),
            root: self.root.clone(),
            board: self.board.clone(),
            lock_timeout_ms: self.lock_timeout_ms,
            config_path: self.config.clone(),
        }
    }

    /// Resolve configuration and build this worker's coordinator
    pub fn connect(&self) -> Result<(Config, Coordinator)> {
        let home_dir = get_home_dir()?;
        let current_dir = std::env::current_dir()?;
        let config = resolve_config(&self.overrides(), &current_dir, &home_dir)?;
        let coordinator = Coordinator::from_config(&config, &home_dir)?;
        Ok((config, coordinator))
    }

    pub fn json(&self) -> bool {
        self.json
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, claim and progress tasks on the board
    #[command(subcommand)]
    Task(task::TaskCommand),

    /// Send, poll and acknowledge mailbox messages
    #[command(subcommand)]
    Mail(mail::MailCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Task(cmd) => task::execute(cmd, &self.global),
            Commands::Mail(cmd) => mail::execute(cmd, &self.global),
        }
    }
}
