// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use iteratr_store::Store;

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct IterationSummaryTool {
    store: Arc<Store>,
    session: String,
}

impl IterationSummaryTool {
    pub fn new(store: Arc<Store>, session: &str) -> Self {
        Self {
            store,
            session: session.to_string(),
        }
    }
}

#[async_trait]
impl Tool for IterationSummaryTool {
    fn name(&self) -> &str {
        "iteration-summary"
    }

    fn description(&self) -> &str {
        "Record a one-paragraph summary of what this iteration accomplished.\n\n\
         Call once near the end of each iteration; the summary appears in the \
         history section of future prompts.  Optionally list the task ids that \
         were worked on."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "What was accomplished, decided, or learned"
                },
                "tasks_worked": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Task ids touched this iteration"
                }
            },
            "required": ["summary"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let summary = match call.args.get("summary").and_then(Value::as_str) {
            Some(s) if !s.trim().is_empty() => s,
            _ => return ToolOutput::err(&call.id, "missing 'summary'"),
        };
        let tasks_worked: Vec<String> = call
            .args
            .get("tasks_worked")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        // The summary belongs to whichever iteration is currently running.
        let state = match self.store.load_state(&self.session).await {
            Ok(state) => state,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        let number = state.iterations.last().map(|i| i.number).unwrap_or(1);

        match self
            .store
            .iteration_summary(&self.session, number, summary, tasks_worked)
            .await
        {
            Ok(()) => ToolOutput::ok(&call.id, format!("Summary recorded for iteration {number}")),
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
    async fn records_summary_for_current_iteration() {
        let (store, _dir) = test_store();
        store.iteration_start("s", 1).await.unwrap();
        store.iteration_complete("s", 1).await.unwrap();
        store.iteration_start("s", 2).await.unwrap();

        let tool = IterationSummaryTool::new(store.clone(), "s");
        let out = tool
            .execute(&call(
                "iteration-summary",
                json!({"summary": "wired up the parser", "tasks_worked": ["TAS-1"]}),
            ))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("iteration 2"));

        let state = store.load_state("s").await.unwrap();
        let it = state.iterations.iter().find(|i| i.number == 2).unwrap();
        assert_eq!(it.summary.as_deref(), Some("wired up the parser"));
        assert_eq!(it.tasks_worked, vec!["TAS-1"]);
    }

    #[tokio::test]
    async fn missing_summary_is_error() {
        let (store, _dir) = test_store();
        let tool = IterationSummaryTool::new(store, "s");
        let out = tool.execute(&call("iteration-summary", json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing 'summary'"));
    }
}
