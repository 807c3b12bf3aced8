// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use iteratr_store::Store;

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct TaskNextTool {
    store: Arc<Store>,
    session: String,
}

impl TaskNextTool {
    pub fn new(store: Arc<Store>, session: &str) -> Self {
        Self {
            store,
            session: session.to_string(),
        }
    }
}

#[async_trait]
impl Tool for TaskNextTool {
    fn name(&self) -> &str {
        "task-next"
    }

    fn description(&self) -> &str {
        "Pick the task to work on next: the highest-priority remaining task \
         whose dependency (if any) is completed; ties break toward the oldest \
         task.  Returns the task as JSON, or {} when nothing is eligible."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let state = match self.store.load_state(&self.session).await {
            Ok(state) => state,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        let text = match state.next_task() {
            Some(task) => serde_json::to_string(task).unwrap_or_else(|_| "{}".to_string()),
            None => "{}".to_string(),
        };
        ToolOutput::ok(&call.id, text)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
