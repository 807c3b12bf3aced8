// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `iteratr-tools` — the session tools the agent calls during an iteration.
//!
//! Every tool is a thin adapter from parsed JSON arguments onto a
//! [`iteratr_store::Store`] mutation or read, so tool effects are ordinary
//! events and replay like any other state change.

pub mod builtin;
pub mod registry;
pub mod tool;

pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{Tool, ToolCall, ToolOutput};

pub use builtin::iteration_summary::IterationSummaryTool;
pub use builtin::note_add::NoteAddTool;
pub use builtin::note_list::NoteListTool;
pub use builtin::session_complete::SessionCompleteTool;
pub use builtin::task_add::TaskAddTool;
pub use builtin::task_list::TaskListTool;
pub use builtin::task_next::TaskNextTool;
pub use builtin::task_update::TaskUpdateTool;

use std::sync::Arc;

use iteratr_store::Store;

/// Build the registry with every session tool bound to `store` / `session`.
pub fn session_registry(store: Arc<Store>, session: &str) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(TaskAddTool::new(store.clone(), session));
    registry.register(TaskUpdateTool::new(store.clone(), session));
    registry.register(TaskListTool::new(store.clone(), session));
    registry.register(TaskNextTool::new(store.clone(), session));
    registry.register(NoteAddTool::new(store.clone(), session));
    registry.register(NoteListTool::new(store.clone(), session));
    registry.register(IterationSummaryTool::new(store.clone(), session));
    registry.register(SessionCompleteTool::new(store, session));
    registry
}
