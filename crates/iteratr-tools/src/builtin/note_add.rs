// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use iteratr_store::{NoteType, Store};

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct NoteAddTool {
    store: Arc<Store>,
    session: String,
}

impl NoteAddTool {
    pub fn new(store: Arc<Store>, session: &str) -> Self {
        Self {
            store,
            session: session.to_string(),
        }
    }
}

#[async_trait]
impl Tool for NoteAddTool {
    fn name(&self) -> &str {
        "note-add"
    }

    fn description(&self) -> &str {
        "Record one or more notes for future iterations.\n\n\
         Types: learning (something discovered about the codebase), decision \
         (a choice made and why), tip (guidance for the next iteration), \
         stuck (a blocker that needs attention)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "notes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "content": { "type": "string" },
                            "type": {
                                "type": "string",
                                "enum": ["learning", "decision", "tip", "stuck"]
                            }
                        },
                        "required": ["content", "type"],
                        "additionalProperties": false
                    },
                    "minItems": 1
                }
            },
            "required": ["notes"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let items = match call.args.get("notes").and_then(Value::as_array) {
            Some(arr) if !arr.is_empty() => arr,
            _ => return ToolOutput::err(&call.id, "missing or empty 'notes' array"),
        };

        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
            let content = match item.get("content").and_then(Value::as_str) {
                Some(s) => s,
                None => return ToolOutput::err(&call.id, "note item missing 'content'"),
            };
            let type_str = match item.get("type").and_then(Value::as_str) {
                Some(s) => s,
                None => return ToolOutput::err(&call.id, "note item missing 'type'"),
            };
            let note_type = match NoteType::parse(type_str) {
                Some(t) => t,
                None => {
                    return ToolOutput::err(&call.id, format!("invalid note type '{type_str}'"))
                }
            };
            parsed.push((content, note_type));
        }

        let mut count = 0usize;
        for (content, note_type) in parsed {
            if let Err(e) = self.store.note_add(&self.session, content, note_type).await {
                return ToolOutput::err(&call.id, e.to_string());
            }
            count += 1;
        }
        ToolOutput::ok(&call.id, format!("Recorded {count} note(s)"))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::builtin::testutil::{call, test_store};

    #[tokio::test]
    async fn records_notes_of_each_type() {
        let (store, _dir) = test_store();
        let tool = NoteAddTool::new(store.clone(), "s");
        let out = tool
            .execute(&call(
                "note-add",
                json!({"notes": [
                    {"content": "uses sqlite", "type": "learning"},
                    {"content": "kept the old API", "type": "decision"}
                ]}),
            ))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("2 note(s)"));

        let state = store.load_state("s").await.unwrap();
        assert_eq!(state.notes.len(), 2);
        assert_eq!(state.notes[0].note_type, NoteType::Learning);
    }

    #[tokio::test]
    async fn invalid_type_is_error() {
        let (store, _dir) = test_store();
        let tool = NoteAddTool::new(store, "s");
        let out = tool
            .execute(&call(
                "note-add",
                json!({"notes": [{"content": "x", "type": "musing"}]}),
            ))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("invalid note type"));
    }

    #[tokio::test]
    async fn empty_content_is_error() {
        let (store, _dir) = test_store();
        let tool = NoteAddTool::new(store, "s");
        let out = tool
            .execute(&call(
                "note-add",
                json!({"notes": [{"content": "  ", "type": "tip"}]}),
            ))
            .await;
        assert!(out.is_error);
    }
}
