// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix for session-scoped task ids (`TAS-1`, `TAS-2`, …).
pub const TASK_ID_PREFIX: &str = "TAS-";

/// Event category.  Together with [`Event::action`] it discriminates the
/// shape of [`Event::meta`]; unknown `(kind, action)` pairs are skipped
/// during projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Task,
    Note,
    Inbox,
    Iteration,
    Control,
}

/// The one persistent record.  Immutable once appended; ordering is
/// per-session by append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Session name; doubles as the log subject (`events.<session>`).
    pub session: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub action: String,
    /// Structured payload whose shape is stable per `(kind, action)`.
    #[serde(default)]
    pub meta: serde_json::Value,
    /// Short human-readable description, for log tails and debugging.
    #[serde(default)]
    pub data: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    fn new(
        session: &str,
        kind: EventKind,
        action: &str,
        meta: serde_json::Value,
        data: String,
    ) -> Self {
        Self {
            session: session.to_string(),
            kind,
            action: action.to_string(),
            meta,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn task_add(session: &str, meta: &TaskAddMeta) -> Self {
        let data = format!("Added task {}: {}", meta.id, meta.content);
        Self::new(session, EventKind::Task, "add", to_meta(meta), data)
    }

    pub fn task_update(session: &str, meta: &TaskUpdateMeta) -> Self {
        let data = format!("Updated task {}", meta.id);
        Self::new(session, EventKind::Task, "update", to_meta(meta), data)
    }

    pub fn note_add(session: &str, meta: &NoteAddMeta) -> Self {
        let data = format!("Added {} note", meta.note_type);
        Self::new(session, EventKind::Note, "add", to_meta(meta), data)
    }

    pub fn inbox_add(session: &str, meta: &InboxAddMeta) -> Self {
        Self::new(
            session,
            EventKind::Inbox,
            "add",
            to_meta(meta),
            "New inbox message".to_string(),
        )
    }

    pub fn inbox_mark_read(session: &str, meta: &InboxMarkReadMeta) -> Self {
        let data = format!("Marked message {} read", meta.id);
        Self::new(session, EventKind::Inbox, "mark_read", to_meta(meta), data)
    }

    pub fn iteration_start(session: &str, number: u32) -> Self {
        let meta = IterationMeta { number };
        let data = format!("Iteration {number} started");
        Self::new(session, EventKind::Iteration, "start", to_meta(&meta), data)
    }

    pub fn iteration_complete(session: &str, number: u32) -> Self {
        let meta = IterationMeta { number };
        let data = format!("Iteration {number} complete");
        Self::new(
            session,
            EventKind::Iteration,
            "complete",
            to_meta(&meta),
            data,
        )
    }

    pub fn iteration_summary(session: &str, meta: &IterationSummaryMeta) -> Self {
        let data = format!("Iteration {} summarized", meta.number);
        Self::new(session, EventKind::Iteration, "summary", to_meta(meta), data)
    }

    pub fn session_complete(session: &str) -> Self {
        Self::new(
            session,
            EventKind::Control,
            "session_complete",
            serde_json::Value::Object(serde_json::Map::new()),
            "Session marked complete".to_string(),
        )
    }

    pub fn agent_error(session: &str, message: &str) -> Self {
        Self::new(
            session,
            EventKind::Control,
            "agent_error",
            serde_json::json!({ "message": message }),
            format!("Agent error: {message}"),
        )
    }
}

fn to_meta<T: Serialize>(meta: &T) -> serde_json::Value {
    // Meta structs contain only plain maps/strings/numbers; serialization
    // cannot fail for them.
    serde_json::to_value(meta).unwrap_or(serde_json::Value::Null)
}

// ── Task vocabulary ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Remaining,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    /// Completed and cancelled tasks accept no further status transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "remaining" => Some(TaskStatus::Remaining),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "blocked" => Some(TaskStatus::Blocked),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Remaining => "remaining",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Learning,
    Decision,
    Tip,
    Stuck,
}

impl NoteType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "learning" => Some(NoteType::Learning),
            "decision" => Some(NoteType::Decision),
            "tip" => Some(NoteType::Tip),
            "stuck" => Some(NoteType::Stuck),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Learning => "learning",
            NoteType::Decision => "decision",
            NoteType::Tip => "tip",
            NoteType::Stuck => "stuck",
        }
    }
}

impl std::fmt::Display for NoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Meta payloads ────────────────────────────────────────────────────────────
//
// One struct per (kind, action) pair.  The store serializes these into
// `Event::meta`; the projection deserializes tolerantly and skips records
// it cannot parse.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAddMeta {
    pub id: String,
    pub content: String,
    pub status: TaskStatus,
    pub priority: u8,
    pub iteration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdateMeta {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteAddMeta {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub iteration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxAddMeta {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMarkReadMeta {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationMeta {
    pub number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationSummaryMeta {
    pub number: u32,
    pub summary: String,
    #[serde(default)]
    pub tasks_worked: Vec<String>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
