// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use iteratr_store::{Store, TaskAddParams, TaskStatus};

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct TaskAddTool {
    store: Arc<Store>,
    session: String,
}

impl TaskAddTool {
    pub fn new(store: Arc<Store>, session: &str) -> Self {
        Self {
            store,
            session: session.to_string(),
        }
    }
}

#[async_trait]
impl Tool for TaskAddTool {
    fn name(&self) -> &str {
        "task-add"
    }

    fn description(&self) -> &str {
        "Add one or more tasks to the session plan.\n\n\
         Each task needs a content string; status defaults to \"remaining\" and \
         priority defaults to 2 (0 = critical … 4 = backlog).  Task content must \
         be unique among non-cancelled tasks.  Returns the assigned task ids."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tasks": {
                    "type": "array",
                    "description": "Tasks to create, in order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "content": {
                                "type": "string",
                                "description": "What needs to be done"
                            },
                            "status": {
                                "type": "string",
                                "enum": ["remaining", "in_progress", "completed", "blocked", "cancelled"]
                            },
                            "priority": {
                                "type": "integer",
                                "minimum": 0,
                                "maximum": 4,
                                "description": "0 = critical … 4 = backlog"
                            }
                        },
                        "required": ["content"],
                        "additionalProperties": false
                    },
                    "minItems": 1
                }
            },
            "required": ["tasks"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let items = match call.args.get("tasks").and_then(Value::as_array) {
            Some(arr) if !arr.is_empty() => arr,
            _ => return ToolOutput::err(&call.id, "missing or empty 'tasks' array"),
        };

        let mut params = Vec::with_capacity(items.len());
        for item in items {
            let content = match item.get("content").and_then(Value::as_str) {
                Some(s) => s.to_string(),
                None => return ToolOutput::err(&call.id, "task item missing 'content'"),
            };
            let status = match item.get("status").and_then(Value::as_str) {
                Some(s) => match TaskStatus::parse(s) {
                    Some(status) => Some(status),
                    None => {
                        return ToolOutput::err(&call.id, format!("invalid status '{s}'"));
                    }
                },
                None => None,
            };
            let priority = match item.get("priority") {
                Some(v) => match v.as_u64() {
                    Some(p) if p <= 4 => Some(p as u8),
                    _ => return ToolOutput::err(&call.id, "priority must be an integer 0-4"),
                },
                None => None,
            };
            params.push(TaskAddParams {
                content,
                status,
                priority,
                iteration: None,
            });
        }

        debug!(session = %self.session, count = params.len(), "task-add");
        match self.store.task_batch_add(&self.session, params).await {
            Ok(tasks) => {
                let lines: Vec<String> = tasks
                    .iter()
                    .map(|t| format!("{}: {}", t.id, t.content))
                    .collect();
                ToolOutput::ok(
                    &call.id,
                    format!("Created {} task(s):\n{}", tasks.len(), lines.join("\n")),
                )
            }
            Err(e) => ToolOutput::err(&call.id, e.to_string()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::builtin::testutil::{call, test_store};

    #[tokio::test]
    async fn creates_tasks_and_reports_ids() {
        let (store, _dir) = test_store();
        let tool = TaskAddTool::new(store.clone(), "s");
        let out = tool
            .execute(&call(
                "task-add",
                json!({"tasks": [
                    {"content": "first"},
                    {"content": "second", "priority": 0}
                ]}),
            ))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("TAS-1: first"));
        assert!(out.content.contains("TAS-2: second"));

        let state = store.load_state("s").await.unwrap();
        assert_eq!(state.tasks.len(), 2);
        assert_eq!(state.tasks["TAS-2"].priority, 0);
    }

    #[tokio::test]
    async fn missing_tasks_array_is_error() {
        let (store, _dir) = test_store();
        let tool = TaskAddTool::new(store, "s");
        let out = tool.execute(&call("task-add", json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.starts_with("error:"));
    }

    #[tokio::test]
    async fn empty_tasks_array_is_error() {
        let (store, _dir) = test_store();
        let tool = TaskAddTool::new(store, "s");
        let out = tool.execute(&call("task-add", json!({"tasks": []}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn duplicate_content_surfaces_as_error_text() {
        let (store, _dir) = test_store();
        let tool = TaskAddTool::new(store, "s");
        let args = json!({"tasks": [{"content": "same"}]});
        tool.execute(&call("task-add", args.clone())).await;
        let out = tool.execute(&call("task-add", args)).await;
        assert!(out.is_error);
        assert!(out.content.contains("already exists"));
    }

    #[tokio::test]
    async fn invalid_status_is_rejected() {
        let (store, _dir) = test_store();
        let tool = TaskAddTool::new(store, "s");
        let out = tool
            .execute(&call(
                "task-add",
                json!({"tasks": [{"content": "x", "status": "paused"}]}),
            ))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("invalid status"));
    }
}
