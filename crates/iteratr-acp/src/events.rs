// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Events emitted by the agent during a single iteration.
/// Consumers (the orchestrator, a UI) receive these over an mpsc channel in
/// stream order.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Incremental assistant output
    Text(String),
    /// Reasoning trace, when the agent exposes one
    Thinking(String),
    /// A tool call changed state; updates for one `tool_call_id` arrive in
    /// stream order
    ToolCall(ToolCallUpdate),
    /// A file was created or modified by a completed edit tool call
    FileChange(FileChange),
    /// The turn ended
    Finish(FinishInfo),
}

/// Lifecycle record for one tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallUpdate {
    pub tool_call_id: String,
    /// Display name of the tool, e.g. "task-update" or "edit file"
    pub title: String,
    pub status: ToolCallStatus,
    /// Tool category; edits are flagged with `"edit"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Diff blocks attached to completed edit calls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diffs: Vec<DiffBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_diff: Option<FileDiff>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    InProgress,
    Completed,
    Error,
    Canceled,
}

/// One edited region: the file path plus the replaced and replacement text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffBlock {
    pub path: String,
    #[serde(default)]
    pub old_text: String,
    #[serde(default)]
    pub new_text: String,
}

/// Line-count summary for one edited file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
}

/// A file change derived from the tool-call stream, see
/// [`crate::derive_file_changes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub abs_path: PathBuf,
    pub is_new: bool,
    pub additions: u32,
    pub deletions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    Cancelled,
    Refusal,
    MaxTurnRequests,
    Error,
}

impl StopReason {
    /// Stop reasons that terminate the whole session, not just the turn.
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Error | StopReason::Refusal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::MaxTokens => "max_tokens",
            StopReason::Cancelled => "cancelled",
            StopReason::Refusal => "refusal",
            StopReason::MaxTurnRequests => "max_turn_requests",
            StopReason::Error => "error",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal record for one iteration.
#[derive(Debug, Clone)]
pub struct FinishInfo {
    pub stop_reason: StopReason,
    pub error: Option<String>,
    pub duration: Duration,
    pub model: String,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
