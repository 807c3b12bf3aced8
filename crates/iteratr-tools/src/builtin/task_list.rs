// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use iteratr_store::{State, Store, Task, TaskStatus};

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct TaskListTool {
    store: Arc<Store>,
    session: String,
}

impl TaskListTool {
    pub fn new(store: Arc<Store>, session: &str) -> Self {
        Self {
            store,
            session: session.to_string(),
        }
    }
}

#[async_trait]
impl Tool for TaskListTool {
    fn name(&self) -> &str {
        "task-list"
    }

    fn description(&self) -> &str {
        "List all tasks in the session, grouped by status."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.store.load_state(&self.session).await {
            Ok(state) => ToolOutput::ok(&call.id, format_task_list(&state)),
            Err(e) => ToolOutput::err(&call.id, e.to_string()),
        }
    }
}

/// Render all tasks grouped by status, in working order: what's active first,
/// then the backlog, then everything finished.
pub fn format_task_list(state: &State) -> String {
    if state.tasks.is_empty() {
        return "No tasks".to_string();
    }

    let groups = [
        ("In progress", TaskStatus::InProgress),
        ("Remaining", TaskStatus::Remaining),
        ("Blocked", TaskStatus::Blocked),
        ("Completed", TaskStatus::Completed),
        ("Cancelled", TaskStatus::Cancelled),
    ];

    let ordered = state.tasks_ordered();
    let mut sections = Vec::new();
    for (label, status) in groups {
        let tasks: Vec<&&Task> = ordered.iter().filter(|t| t.status == status).collect();
        if tasks.is_empty() {
            continue;
        }
        let lines: Vec<String> = tasks.iter().map(|t| format_task_line(t)).collect();
        sections.push(format!("{label}:\n{}", lines.join("\n")));
    }
    sections.join("\n\n")
}

fn format_task_line(task: &Task) -> String {
    let mut line = format!("  [{}] {} (iter {})", task.id, task.content, task.iteration);
    if let Some(dep) = &task.depends_on {
        line.push_str(&format!(" [depends on {dep}]"));
    }
    line
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
