//! `acb mail ...` commands

use agent_coord_core::mailbox::{AckOutcome, AckResult};
use agent_coord_core::schema::{MessageDraft, MessageType, Priority};
use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::{json, Value};
use uuid::Uuid;

use super::output::{message_line, print_json};
use super::GlobalArgs;

#[derive(Subcommand, Debug)]
pub enum MailCommand {
    /// Deliver a message to another worker's inbox
    Send {
        /// Recipient worker id
        to: String,

        subject: String,

        /// Message body (plain text unless --json-body)
        #[arg(default_value = "")]
        body: String,

        /// task, status, request, response, notification or review
        #[arg(long = "type", default_value = "notification")]
        message_type: MessageType,

        #[arg(long, default_value = "normal")]
        priority: Priority,

        /// Parse the body as JSON
        #[arg(long)]
        json_body: bool,
    },

    /// List pending messages without acknowledging them
    Poll {
        /// Maximum messages to return (default: [mailbox] batch_size)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Acknowledge a message, moving it out of the inbox
    Ack {
        message_id: Uuid,

        /// Record the message as failed instead of handled
        #[arg(long)]
        failed: bool,
    },

    /// Show inbox counts for this worker
    Status,
}

/// Execute a mail command
pub fn execute(command: MailCommand, global: &GlobalArgs) -> Result<()> {
    let (_config, coordinator) = global.connect()?;
    let json = global.json();

    match command {
        MailCommand::Send {
            to,
            subject,
            body,
            message_type,
            priority,
            json_body,
        } => {
            let body: Value = if json_body {
                serde_json::from_str(&body).context("--json-body given but body is not valid JSON")?
            } else {
                Value::String(body)
            };
            let draft = MessageDraft::new(subject, body)
                .with_type(message_type)
                .with_priority(priority);
            let id = coordinator.send_draft(&to, draft)?;

            if json {
                print_json(&json!({ "messageId": id, "to": to }))
            } else {
                println!("Sent {id} to {to}");
                Ok(())
            }
        }
        MailCommand::Poll { limit } => {
            let coordinator = match limit {
                Some(limit) => coordinator.with_batch_size(limit),
                None => coordinator,
            };
            let messages = coordinator.poll_inbox()?;
            if json {
                return print_json(&messages);
            }
            if messages.is_empty() {
                println!("No messages");
            }
            for message in &messages {
                println!("{}", message_line(message));
            }
            Ok(())
        }
        MailCommand::Ack { message_id, failed } => {
            let outcome = if failed { AckOutcome::Failed } else { AckOutcome::Handled };
            let result = coordinator
                .acknowledge(message_id, outcome)
                .with_context(|| format!("acknowledging message {message_id}"))?;

            let moved = matches!(result, AckResult::Moved { .. });
            if json {
                print_json(&json!({ "messageId": message_id, "moved": moved }))
            } else if moved {
                println!("Acknowledged {message_id}");
                Ok(())
            } else {
                println!("Message {message_id} was already handled");
                Ok(())
            }
        }
        MailCommand::Status => {
            let mailbox = coordinator.mailbox();
            let pending = mailbox.pending_count()?;
            let errored = mailbox.quarantined()?.len();
            if json {
                print_json(&json!({
                    "owner": mailbox.owner(),
                    "pending": pending,
                    "error": errored,
                }))
            } else {
                println!("{}: {pending} pending, {errored} in error/", mailbox.owner());
                Ok(())
            }
        }
    }
}
