// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `iteratr-acp` — the contract between the orchestrator and the external
//! coding agent.
//!
//! The orchestrator only depends on the [`AgentRunner`] trait: start the
//! agent, run one iteration per prompt, observe the [`AgentEvent`] stream,
//! stop.  [`ProcessRunner`] drives a real agent subprocess over newline-
//! delimited JSON frames; [`ScriptedRunner`] replays pre-programmed event
//! scripts for tests.

mod events;
mod file_change;
mod mock;
mod process;
mod runner;

pub use events::{
    AgentEvent, DiffBlock, FileChange, FileDiff, FinishInfo, StopReason, ToolCallStatus,
    ToolCallUpdate,
};
pub use file_change::derive_file_changes;
pub use mock::{ScriptedIteration, ScriptedRunner};
pub use process::ProcessRunner;
pub use runner::{AgentConfig, AgentRunner};
