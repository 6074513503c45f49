//! Task listing filters

use crate::schema::{Priority, Task, TaskStatus};
use std::collections::BTreeSet;

/// Criteria for `TaskBoard::list_tasks`; the default matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    /// Keep tasks whose status is in this set (empty = any status)
    pub statuses: BTreeSet<TaskStatus>,
    /// Keep tasks owned by this worker
    pub assignee: Option<String>,
    /// Keep tasks at or above this priority
    pub min_priority: Option<Priority>,
    /// Keep tasks whose required capabilities are covered by this set
    pub capabilities: Option<BTreeSet<String>>,
}

impl TaskFilter {
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.statuses.insert(status);
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_min_priority(mut self, priority: Priority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if let Some(ref assignee) = self.assignee
            && task.assignee.as_ref() != Some(assignee)
        {
            return false;
        }
        if let Some(min) = self.min_priority
            && task.priority < min
        {
            return false;
        }
        if let Some(ref caps) = self.capabilities
            && !task.required_capabilities.is_subset(caps)
        {
            return false;
        }
        true
    }
}

/// Board listing order: highest priority first, then oldest, then id
pub(crate) fn listing_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}
