//! Human and JSON renderings shared by the commands

use agent_coord_core::schema::{Message, Task};
use anyhow::Result;
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn task_line(task: &Task) -> String {
    format!(
        "{}  {:<24}  {:<8}  {:<12}  {}",
        task.id,
        task.status.as_str(),
        task.priority.as_str(),
        task.assignee.as_deref().unwrap_or("-"),
        task.title
    )
}

pub fn print_task(task: &Task) {
    println!("{}", task_line(task));
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    if !task.dependencies.is_empty() {
        let deps: Vec<&str> = task.dependencies.iter().map(String::as_str).collect();
        println!("  depends on: {}", deps.join(", "));
    }
    if let Some(ref reason) = task.blocked_reason {
        println!("  blocked: {reason}");
    }
    if let Some(ref summary) = task.result_summary {
        println!("  result: {summary}");
    }
    if let Some(ref details) = task.error_details {
        println!("  error: {details}");
    }
}

pub fn message_line(message: &Message) -> String {
    let body = match message.body_text() {
        Some(text) => text.to_string(),
        None if message.body.is_null() => String::new(),
        None => message.body.to_string(),
    };
    format!(
        "{}  [{}] {} -> {}: {}  {}",
        message.message_id,
        message.message_type,
        message.sender_id,
        message.recipient_id,
        message.subject,
        body
    )
}
