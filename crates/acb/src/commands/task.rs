//! `acb task ...` commands

use agent_coord_core::board::{Outcome, TaskFilter};
use agent_coord_core::facade::{Coordinator, Report};
use agent_coord_core::schema::{NewTask, Priority, Task, TaskStatus, TaskUpdate};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use super::output::{print_json, print_task, task_line};
use super::GlobalArgs;

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a PENDING task to the board
    Add(AddArgs),

    /// Show one task
    Get { id: String },

    /// List tasks, highest priority first
    List(ListArgs),

    /// Change a task's descriptive fields
    Update(UpdateArgs),

    /// Claim a specific PENDING task
    Claim { id: String },

    /// Claim the best eligible PENDING task
    Next(NextArgs),

    /// Start work on a claimed task
    Start { id: String },

    /// Submit finished work for review
    Submit {
        id: String,
        /// Result summary for the reviewer
        #[arg(long)]
        summary: String,
    },

    /// Submit failed work for review
    Fail {
        id: String,
        /// What went wrong
        #[arg(long)]
        details: String,
    },

    /// Record the review outcome of a submitted task
    Finalize {
        id: String,
        /// success or failure
        #[arg(long)]
        outcome: Outcome,
        /// Review notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Block a claimed or in-progress task
    Block {
        id: String,
        #[arg(long)]
        reason: String,
    },

    /// Return a blocked task to the state it was blocked from
    Unblock { id: String },

    /// Move finished tasks into the archive log
    Archive,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    title: String,

    #[arg(long, default_value = "")]
    description: String,

    /// low, normal, high or critical
    #[arg(long, default_value = "normal")]
    priority: Priority,

    /// Explicit task id (default: generated UUID)
    #[arg(long)]
    id: Option<String>,

    /// Task id that must complete first (repeatable)
    #[arg(long = "depends-on", value_name = "ID")]
    depends_on: Vec<String>,

    /// Capability a worker needs to be offered this task (repeatable)
    #[arg(long = "requires", value_name = "CAPABILITY")]
    requires: Vec<String>,

    /// Extra field stored with the task, value parsed as JSON when possible
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    fields: Vec<(String, Value)>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only tasks in this status (repeatable)
    #[arg(long)]
    status: Vec<TaskStatus>,

    #[arg(long)]
    assignee: Option<String>,

    #[arg(long)]
    min_priority: Option<Priority>,

    /// Only tasks this worker assigns to itself
    #[arg(long)]
    mine: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    id: String,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    priority: Option<Priority>,

    /// Replace the dependency set (repeatable)
    #[arg(long = "depends-on", value_name = "ID")]
    depends_on: Option<Vec<String>>,

    /// Replace the required capability set (repeatable)
    #[arg(long = "requires", value_name = "CAPABILITY")]
    requires: Option<Vec<String>>,

    /// Set an extra field; `KEY=null` removes it
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    fields: Vec<(String, Value)>,
}

#[derive(Args, Debug)]
pub struct NextArgs {
    /// Capability this worker holds; only tasks it covers are offered (repeatable)
    #[arg(long = "capability", value_name = "CAPABILITY")]
    capabilities: Vec<String>,

    /// Retry lock contention with backoff from the [retry] config
    #[arg(long)]
    retry: bool,
}

/// Execute a task command
pub fn execute(command: TaskCommand, global: &GlobalArgs) -> Result<()> {
    let (config, coordinator) = global.connect()?;
    let json = global.json();

    match command {
        TaskCommand::Add(args) => {
            let new = NewTask {
                id: args.id,
                title: args.title,
                description: args.description,
                priority: args.priority,
                dependencies: args.depends_on.into_iter().collect(),
                required_capabilities: args.requires.into_iter().collect(),
                extra_fields: args.fields.into_iter().collect(),
            };
            let task = coordinator.add_task(new)?;
            emit(&task, json, "Added")
        }
        TaskCommand::Get { id } => {
            let task = coordinator.board().get_task(&id)?;
            if json {
                print_json(&task)
            } else {
                print_task(&task);
                Ok(())
            }
        }
        TaskCommand::List(args) => list(&coordinator, args, json),
        TaskCommand::Update(args) => {
            let update = TaskUpdate {
                id: None,
                title: args.title,
                description: args.description,
                priority: args.priority,
                dependencies: args.depends_on.map(|d| d.into_iter().collect()),
                required_capabilities: args.requires.map(|r| r.into_iter().collect()),
                extra_fields: args.fields.into_iter().collect::<HashMap<_, _>>(),
            };
            let task = coordinator
                .update_task(&args.id, update)
                .with_context(|| format!("updating task {}", args.id))?;
            emit(&task, json, "Updated")
        }
        TaskCommand::Claim { id } => {
            let task = coordinator.claim(&id)?;
            emit(&task, json, "Claimed")
        }
        TaskCommand::Next(args) => {
            let capabilities: Option<BTreeSet<String>> = if args.capabilities.is_empty() {
                None
            } else {
                Some(args.capabilities.into_iter().collect())
            };
            let claim = || coordinator.claim_next(capabilities.as_ref());
            let claimed = if args.retry {
                config.retry_policy().run("claim_next", claim)?
            } else {
                claim()?
            };

            match claimed {
                Some(task) => emit(&task, json, "Claimed"),
                None if json => print_json(&Value::Null),
                None => {
                    println!("No eligible task");
                    Ok(())
                }
            }
        }
        TaskCommand::Start { id } => {
            let task = coordinator.start(&id)?;
            emit(&task, json, "Started")
        }
        TaskCommand::Submit { id, summary } => {
            let task = coordinator.report(&id, Report::Done, &summary)?;
            emit(&task, json, "Submitted")
        }
        TaskCommand::Fail { id, details } => {
            let task = coordinator.report(&id, Report::Failed, &details)?;
            emit(&task, json, "Submitted as failed")
        }
        TaskCommand::Finalize { id, outcome, notes } => {
            let task = coordinator.review(&id, outcome, notes.as_deref())?;
            emit(&task, json, "Finalized")
        }
        TaskCommand::Block { id, reason } => {
            let task = coordinator.block(&id, &reason)?;
            emit(&task, json, "Blocked")
        }
        TaskCommand::Unblock { id } => {
            let task = coordinator.unblock(&id)?;
            emit(&task, json, "Unblocked")
        }
        TaskCommand::Archive => {
            let archived = coordinator.archive()?;
            if json {
                return print_json(&archived);
            }
            println!("Archived {} task(s)", archived.len());
            for task in &archived {
                println!("  {}", task_line(task));
            }
            Ok(())
        }
    }
}

fn list(coordinator: &Coordinator, args: ListArgs, json: bool) -> Result<()> {
    let mut filter = TaskFilter {
        statuses: args.status.into_iter().collect(),
        assignee: args.assignee,
        min_priority: args.min_priority,
        capabilities: None,
    };
    if args.mine {
        filter = filter.with_assignee(coordinator.identity());
    }

    let tasks = coordinator.list_tasks(&filter)?;
    if json {
        return print_json(&tasks);
    }
    if tasks.is_empty() {
        println!("No tasks");
    }
    for task in &tasks {
        println!("{}", task_line(task));
    }
    Ok(())
}

fn emit(task: &Task, json: bool, verb: &str) -> Result<()> {
    if json {
        print_json(task)
    } else {
        println!("{verb}: {}", task_line(task));
        Ok(())
    }
}

/// `KEY=VALUE` where VALUE is JSON if it parses, else a plain string
fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("field key must not be empty".to_string());
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
