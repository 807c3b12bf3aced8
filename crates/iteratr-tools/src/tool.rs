// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

/// A single tool invocation requested by the agent.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier from the caller (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

/// The result of executing a tool.  `content` is the text the agent sees;
/// error results carry an `error: ` prefix so they are recognisable in-band.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful plain-text result.
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Error result.  The message is prefixed with `error: ` unless the
    /// caller already did so.
    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let content = if msg.starts_with("error:") {
            msg
        } else {
            format!("error: {msg}")
        };
        Self {
            call_id: call_id.into(),
            content,
            is_error: true,
        }
    }
}

/// Trait every session tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters
    fn parameters_schema(&self) -> Value;
    /// Execute the tool.  Failures are reported via [`ToolOutput::err`].
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_output_is_not_error() {
        let out = ToolOutput::ok("c1", "done");
        assert!(!out.is_error);
        assert_eq!(out.content, "done");
    }

    #[test]
    fn err_output_gains_prefix() {
        let out = ToolOutput::err("c1", "missing field");
        assert!(out.is_error);
        assert_eq!(out.content, "error: missing field");
    }

    #[test]
    fn err_output_does_not_double_prefix() {
        let out = ToolOutput::err("c1", "error: already prefixed");
        assert_eq!(out.content, "error: already prefixed");
    }
}
