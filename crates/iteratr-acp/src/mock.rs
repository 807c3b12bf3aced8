// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Pre-scripted agent runner for tests.
//!
//! Each call to `run_iteration` pops the next [`ScriptedIteration`] from the
//! front of the queue, performs its tool calls against the real tool server
//! over HTTP, then emits its event script.  This lets orchestrator tests
//! specify exact agent behaviour — including mid-loop `session-complete`
//! calls — without a subprocess or a model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use crate::events::{AgentEvent, FinishInfo, StopReason};
use crate::runner::AgentRunner;

/// One scripted turn: tool calls first, then the event stream.
#[derive(Default)]
pub struct ScriptedIteration {
    /// `(tool name, arguments)` pairs POSTed to the tool server in order.
    pub tool_calls: Vec<(String, serde_json::Value)>,
    /// Events emitted after the tool calls.  A final `Finish` is appended
    /// automatically when the script does not end with one.
    pub events: Vec<AgentEvent>,
}

impl ScriptedIteration {
    /// A turn that only emits one text chunk.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            tool_calls: Vec::new(),
            events: vec![AgentEvent::Text(text.into())],
        }
    }

    /// A turn that performs one tool call and emits nothing else.
    pub fn tool(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool_calls: vec![(name.into(), arguments)],
            events: Vec::new(),
        }
    }

    pub fn with_tool(mut self, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        self.tool_calls.push((name.into(), arguments));
        self
    }
}

pub struct ScriptedRunner {
    mcp_server_url: String,
    iterations: Mutex<VecDeque<ScriptedIteration>>,
    session_complete: Arc<AtomicBool>,
    started: AtomicBool,
    client: reqwest::Client,
}

impl ScriptedRunner {
    pub fn new(mcp_server_url: &str, iterations: Vec<ScriptedIteration>) -> Self {
        Self {
            mcp_server_url: mcp_server_url.to_string(),
            iterations: Mutex::new(iterations.into()),
            session_complete: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    /// Runner whose every turn ends immediately and never completes the
    /// session — useful for iteration-cap tests.
    pub fn never_completing(mcp_server_url: &str) -> Self {
        Self::new(mcp_server_url, Vec::new())
    }

    async fn call_tool(&self, name: &str, arguments: &serde_json::Value) -> Result<String> {
        let resp = self
            .client
            .post(&self.mcp_server_url)
            .json(&json!({ "name": name, "arguments": arguments }))
            .send()
            .await
            .with_context(|| format!("posting tool call {name}"))?;
        let body: serde_json::Value = resp.json().await.context("parsing tool response")?;
        let text = body["content"][0]["text"].as_str().unwrap_or("").to_string();
        debug!(tool = name, %text, "scripted tool call");
        Ok(text)
    }
}

#[async_trait]
impl AgentRunner for ScriptedRunner {
    async fn start(&mut self) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn run_iteration(
        &mut self,
        _prompt: &str,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<()> {
        if !self.started.load(Ordering::SeqCst) {
            anyhow::bail!("agent not started");
        }
        let script = self
            .iterations
            .lock()
            .expect("script queue poisoned")
            .pop_front()
            .unwrap_or_default();

        for (name, arguments) in &script.tool_calls {
            let text = self.call_tool(name, arguments).await?;
            if name == "session-complete" && !text.starts_with("error:") {
                self.session_complete.store(true, Ordering::SeqCst);
            }
        }

        let mut finished = false;
        for event in script.events {
            finished = finished || matches!(event, AgentEvent::Finish(_));
            let _ = events.send(event).await;
        }
        if !finished {
            let _ = events
                .send(AgentEvent::Finish(FinishInfo {
                    stop_reason: StopReason::EndTurn,
                    error: None,
                    duration: Duration::from_millis(1),
                    model: "scripted-mock".to_string(),
                }))
                .await;
        }
        Ok(())
    }

    fn is_session_complete(&self) -> bool {
        self.session_complete.load(Ordering::SeqCst)
    }

    async fn stop(&mut self) {
        self.started.store(false, Ordering::SeqCst);
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
