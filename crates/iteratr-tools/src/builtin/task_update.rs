// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use iteratr_store::{Store, TaskStatus, TaskUpdateParams};

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct TaskUpdateTool {
    store: Arc<Store>,
    session: String,
}

impl TaskUpdateTool {
    pub fn new(store: Arc<Store>, session: &str) -> Self {
        Self {
            store,
            session: session.to_string(),
        }
    }
}

#[async_trait]
impl Tool for TaskUpdateTool {
    fn name(&self) -> &str {
        "task-update"
    }

    fn description(&self) -> &str {
        "Update a task's status, priority, or dependency.\n\n\
         The id may be a full task id (TAS-3) or any unique prefix.  Completed \
         and cancelled tasks accept no further status changes.  Set depends_on \
         to \"\" to clear an existing dependency."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Task id or unique prefix"
                },
                "status": {
                    "type": "string",
                    "enum": ["remaining", "in_progress", "completed", "blocked", "cancelled"]
                },
                "priority": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 4
                },
                "depends_on": {
                    "type": "string",
                    "description": "Id of the task this one depends on; empty string clears"
                }
            },
            "required": ["id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let id = match call.args.get("id").and_then(Value::as_str) {
            Some(s) if !s.is_empty() => s,
            _ => return ToolOutput::err(&call.id, "missing 'id'"),
        };

        let status = match call.args.get("status").and_then(Value::as_str) {
            Some(s) => match TaskStatus::parse(s) {
                Some(status) => Some(status),
                None => return ToolOutput::err(&call.id, format!("invalid status '{s}'")),
            },
            None => None,
        };
        let priority = match call.args.get("priority") {
            Some(v) => match v.as_u64() {
                Some(p) if p <= 4 => Some(p as u8),
                _ => return ToolOutput::err(&call.id, "priority must be an integer 0-4"),
            },
            None => None,
        };
        let depends_on = call
            .args
            .get("depends_on")
            .and_then(Value::as_str)
            .map(String::from);

        let params = TaskUpdateParams {
            status,
            priority,
            depends_on,
        };
        match self.store.task_update(&self.session, id, params).await {
            Ok(task) => ToolOutput::ok(
                &call.id,
                format!(
                    "Updated task {} (status: {}, priority: {})",
                    task.id, task.status, task.priority
                ),
            ),
            Err(e) => ToolOutput::err(&call.id, e.to_string()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
