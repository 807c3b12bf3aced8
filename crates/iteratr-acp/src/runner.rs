// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::events::AgentEvent;

/// Construction parameters shared by every runner implementation.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Free-form model identifier forwarded to the agent
    pub model: String,
    /// Absolute path the agent works in
    pub work_dir: PathBuf,
    /// The tool server endpoint, e.g. `http://localhost:49152/mcp`
    pub mcp_server_url: String,
    /// Registration name the agent uses for the tool server
    pub mcp_server_name: String,
}

impl AgentConfig {
    pub fn new(model: &str, work_dir: PathBuf, mcp_server_url: &str) -> Self {
        Self {
            model: model.to_string(),
            work_dir,
            mcp_server_url: mcp_server_url.to_string(),
            mcp_server_name: "iteratr-tools".to_string(),
        }
    }
}

/// Abstracts the external agent process driving each iteration.
///
/// Contract: [`start`](Self::start) is called once before the first
/// iteration; [`run_iteration`](Self::run_iteration) sends one prompt,
/// delivers [`AgentEvent`]s in stream order on `events`, and returns when
/// the turn ends; [`is_session_complete`](Self::is_session_complete)
/// reports whether a `session-complete` tool call was observed;
/// [`stop`](Self::stop) terminates the agent and is idempotent.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn start(&mut self) -> anyhow::Result<()>;

    async fn run_iteration(
        &mut self,
        prompt: &str,
        events: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<()>;

    fn is_session_complete(&self) -> bool;

    async fn stop(&mut self);
}
