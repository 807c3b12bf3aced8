// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `iteratr-mcp` — the in-process HTTP tool server.
//!
//! The agent subprocess manipulates session state exclusively through this
//! server: one `POST` endpoint, one JSON request per tool call, one text
//! result per response.  Because every tool resolves to a store mutation,
//! tool effects are ordinary events and replay with the rest of the session.
//!
//! # Wire format
//!
//! Request:  `{"name": "task-add", "arguments": {...}}`
//! Response: `{"content": [{"type": "text", "text": "..."}]}`
//!
//! Tool-level failures stay HTTP 200 with the text prefixed `error:`;
//! transport-level failures use HTTP status codes.
//!
//! # Architecture
//!
//! ```text
//! Agent subprocess
//!       │  HTTP POST /mcp
//!       ▼
//! ToolServer (axum, 127.0.0.1:<free port>)
//!       │
//!       ▼
//! ToolRegistry  ──►  Tool::execute()  ──►  Store mutation
//! ```

mod server;
mod wire;

pub use server::ToolServer;
pub use wire::{output_to_response, ContentItem, ToolRequest, ToolResponse};
