// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use iteratr_store::{NoteType, Store};

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct NoteListTool {
    store: Arc<Store>,
    session: String,
}

impl NoteListTool {
    pub fn new(store: Arc<Store>, session: &str) -> Self {
        Self {
            store,
            session: session.to_string(),
        }
    }
}

#[async_trait]
impl Tool for NoteListTool {
    fn name(&self) -> &str {
        "note-list"
    }

    fn description(&self) -> &str {
        "List recorded notes, optionally filtered by type."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["learning", "decision", "tip", "stuck"],
                    "description": "Only list notes of this type"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let filter = match call.args.get("type").and_then(Value::as_str) {
            Some(s) => match NoteType::parse(s) {
                Some(t) => Some(t),
                None => return ToolOutput::err(&call.id, format!("invalid note type '{s}'")),
            },
            None => None,
        };

        let state = match self.store.load_state(&self.session).await {
            Ok(state) => state,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };

        let lines: Vec<String> = state
            .notes
            .iter()
            .filter(|n| filter.map(|f| n.note_type == f).unwrap_or(true))
            .map(|n| format!("[{}] (#{}) {}", n.note_type, n.iteration, n.content))
            .collect();

        if lines.is_empty() {
            ToolOutput::ok(&call.id, "No notes")
        } else {
            ToolOutput::ok(&call.id, lines.join("\n"))
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
