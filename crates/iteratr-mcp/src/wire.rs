// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Wire types for the tool protocol, and the conversion from tool outputs.
//! These are pure, stateless functions at the seam between the tools crate
//! and the HTTP transport.

use serde::{Deserialize, Serialize};

use iteratr_tools::ToolOutput;

/// A tool invocation as posted by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// One content item in a tool response.  Only `text` items exist today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// The tool response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<ContentItem>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
        }
    }

    /// The concatenated text of all content items.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True when the result text signals a tool-level error.
    pub fn is_error(&self) -> bool {
        self.text_content().starts_with("error:")
    }
}

/// Convert a tool output into the wire response.  Error outputs already
/// carry the `error:` prefix, so the envelope is identical either way.
pub fn output_to_response(output: ToolOutput) -> ToolResponse {
    ToolResponse::text(output.content)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_with_and_without_arguments() {
        let req: ToolRequest = serde_json::from_str(r#"{"name": "task-list"}"#).unwrap();
        assert_eq!(req.name, "task-list");
        assert!(req.arguments.is_null());

        let req: ToolRequest =
            serde_json::from_str(r#"{"name": "task-update", "arguments": {"id": "TAS-1"}}"#)
                .unwrap();
        assert_eq!(req.arguments["id"], "TAS-1");
    }

    #[test]
    fn response_serializes_to_content_list() {
        let resp = ToolResponse::text("done");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "done");
    }

    #[test]
    fn ok_output_converts_to_plain_text() {
        let resp = output_to_response(ToolOutput::ok("c1", "Created 1 task(s)"));
        assert!(!resp.is_error());
        assert_eq!(resp.text_content(), "Created 1 task(s)");
    }

    #[test]
    fn error_output_keeps_error_prefix() {
        let resp = output_to_response(ToolOutput::err("c1", "unknown tool: bogus"));
        assert!(resp.is_error());
        assert_eq!(resp.text_content(), "error: unknown tool: bogus");
    }
}
