// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use iteratr_store::Store;

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct SessionCompleteTool {
    store: Arc<Store>,
    session: String,
}

impl SessionCompleteTool {
    pub fn new(store: Arc<Store>, session: &str) -> Self {
        Self {
            store,
            session: session.to_string(),
        }
    }
}

#[async_trait]
impl Tool for SessionCompleteTool {
    fn name(&self) -> &str {
        "session-complete"
    }

    fn description(&self) -> &str {
        "Mark the session as complete.  Call ONLY when every requirement of \
         the spec is implemented and verified; the orchestrator stops looping \
         after the current iteration."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.store.session_complete(&self.session).await {
            Ok(()) => {
                info!(session = %self.session, "session marked complete by agent");
                ToolOutput::ok(&call.id, "Session marked as complete")
            }
            Err(e) => ToolOutput::err(&call.id, e.to_string()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
