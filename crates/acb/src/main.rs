//! acb - task board and mailbox CLI for cooperating agents
//!
//! A thin CLI over the `agent-coord-core` coordinator: every command
//! resolves configuration, opens this worker's board and mailbox, performs
//! one operation and exits. Failures exit with status 1.

use agent_coord_core::io::CoordError;
use clap::Parser;

mod commands;

use commands::Cli;

fn main() {
    agent_coord_core::logging::init();
    let cli = Cli::parse();

    if let Err(e) = cli.execute() {
        log_failure(&e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn log_failure(e: &anyhow::Error) {
    match e.downcast_ref::<CoordError>() {
        Some(coord) => tracing::error!(
            error_kind = coord.kind(),
            task_id = coord.task_id().unwrap_or(""),
            retryable = coord.is_retryable(),
            error = %e,
            "command failed"
        ),
        None => tracing::error!(error_kind = "command", error = %e, "command failed"),
    }
}
