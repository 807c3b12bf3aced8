// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Materialized session state, folded from the event log.
//!
//! [`State::apply`] is a pure, tolerant reducer: for any event prefix the
//! resulting state is a deterministic function of that prefix, and malformed
//! or unknown records are skipped (with a log line) rather than corrupting
//! the fold.  Strict validation happens at write time in the store; by the
//! time an event is on disk the projection's job is to never crash on it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::event::{
    Event, EventKind, InboxAddMeta, InboxMarkReadMeta, IterationMeta, IterationSummaryMeta,
    NoteAddMeta, NoteType, TaskAddMeta, TaskStatus, TaskUpdateMeta, TASK_ID_PREFIX,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    pub status: TaskStatus,
    pub priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    /// Iteration at creation or last update.
    pub iteration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub iteration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboxMessage {
    pub id: String,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Iteration {
    pub number: u32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks_worked: Vec<String>,
}

/// Materialized view of one session.  Produced by `Store::load_state`, owned
/// by the caller for one request, then discarded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub session: String,
    pub tasks: HashMap<String, Task>,
    pub notes: Vec<Note>,
    pub inbox: Vec<InboxMessage>,
    pub iterations: Vec<Iteration>,
    pub complete: bool,
    /// Highest task ordinal issued so far; the next `task.add` gets
    /// `TAS-<task_seq + 1>`.
    #[serde(skip)]
    task_seq: u32,
}

impl State {
    pub fn new(session: &str) -> Self {
        Self {
            session: session.to_string(),
            ..Default::default()
        }
    }

    /// Fold one event into the state.  Never fails; unknown or malformed
    /// records are skipped.
    pub fn apply(&mut self, event: &Event) {
        match (event.kind, event.action.as_str()) {
            (EventKind::Task, "add") => self.apply_task_add(event),
            (EventKind::Task, "update") => self.apply_task_update(event),
            (EventKind::Note, "add") => self.apply_note_add(event),
            (EventKind::Inbox, "add") => self.apply_inbox_add(event),
            (EventKind::Inbox, "mark_read") => self.apply_inbox_mark_read(event),
            (EventKind::Iteration, "start") => self.apply_iteration_start(event),
            (EventKind::Iteration, "complete") => self.apply_iteration_complete(event),
            (EventKind::Iteration, "summary") => self.apply_iteration_summary(event),
            (EventKind::Control, "session_complete") => self.complete = true,
            (kind, action) => {
                debug!(?kind, action, "skipping unknown event pair");
            }
        }
    }

    fn apply_task_add(&mut self, event: &Event) {
        let Some(meta) = parse_meta::<TaskAddMeta>(event) else {
            return;
        };
        if self.has_active_content(&meta.content) {
            warn!(session = %self.session, content = %meta.content,
                  "skipping task.add duplicating an active task");
            return;
        }
        // Trust the writer-assigned id unless a concurrent writer claimed it
        // first; the append order is the arbiter, so the loser is renumbered.
        let id = if self.tasks.contains_key(&meta.id) {
            self.next_task_id()
        } else {
            meta.id.clone()
        };
        self.task_seq = self.task_seq.max(task_number(&id).unwrap_or(0));
        self.tasks.insert(
            id.clone(),
            Task {
                id,
                content: meta.content,
                status: meta.status,
                priority: meta.priority,
                depends_on: None,
                iteration: meta.iteration,
            },
        );
    }

    fn apply_task_update(&mut self, event: &Event) {
        let Some(meta) = parse_meta::<TaskUpdateMeta>(event) else {
            return;
        };
        let Some(task) = self.tasks.get_mut(&meta.id) else {
            warn!(session = %self.session, id = %meta.id,
                  "skipping task.update for unknown task");
            return;
        };
        if let Some(status) = meta.status {
            task.status = status;
        }
        if let Some(priority) = meta.priority {
            task.priority = priority;
        }
        if let Some(depends_on) = meta.depends_on {
            task.depends_on = if depends_on.is_empty() {
                None
            } else {
                Some(depends_on)
            };
        }
        if let Some(iteration) = meta.iteration {
            task.iteration = iteration;
        }
    }

    fn apply_note_add(&mut self, event: &Event) {
        let Some(meta) = parse_meta::<NoteAddMeta>(event) else {
            return;
        };
        self.notes.push(Note {
            id: meta.id,
            content: meta.content,
            note_type: meta.note_type,
            iteration: meta.iteration,
        });
    }

    fn apply_inbox_add(&mut self, event: &Event) {
        let Some(meta) = parse_meta::<InboxAddMeta>(event) else {
            return;
        };
        self.inbox.push(InboxMessage {
            id: meta.id,
            content: meta.content,
            read: false,
            created_at: event.timestamp,
        });
    }

    fn apply_inbox_mark_read(&mut self, event: &Event) {
        let Some(meta) = parse_meta::<InboxMarkReadMeta>(event) else {
            return;
        };
        match self.inbox.iter_mut().find(|m| m.id == meta.id) {
            Some(msg) => msg.read = true,
            None => warn!(session = %self.session, id = %meta.id,
                          "skipping mark_read for unknown message"),
        }
    }

    fn apply_iteration_start(&mut self, event: &Event) {
        let Some(meta) = parse_meta::<IterationMeta>(event) else {
            return;
        };
        if self.iteration_mut(meta.number).is_some() {
            // A restarted iteration keeps its original record.
            debug!(number = meta.number, "iteration.start for existing record");
            return;
        }
        self.insert_iteration(Iteration {
            number: meta.number,
            started_at: event.timestamp,
            ended_at: None,
            complete: false,
            summary: None,
            tasks_worked: Vec::new(),
        });
    }

    fn apply_iteration_complete(&mut self, event: &Event) {
        let Some(meta) = parse_meta::<IterationMeta>(event) else {
            return;
        };
        match self.iteration_mut(meta.number) {
            Some(it) => {
                it.complete = true;
                it.ended_at = Some(event.timestamp);
            }
            // A complete without a start synthesizes a zero-length record.
            None => self.insert_iteration(Iteration {
                number: meta.number,
                started_at: event.timestamp,
                ended_at: Some(event.timestamp),
                complete: true,
                summary: None,
                tasks_worked: Vec::new(),
            }),
        }
    }

    fn apply_iteration_summary(&mut self, event: &Event) {
        let Some(meta) = parse_meta::<IterationSummaryMeta>(event) else {
            return;
        };
        match self.iteration_mut(meta.number) {
            Some(it) => {
                it.summary = Some(meta.summary);
                it.tasks_worked = meta.tasks_worked;
            }
            None => self.insert_iteration(Iteration {
                number: meta.number,
                started_at: event.timestamp,
                ended_at: None,
                complete: false,
                summary: Some(meta.summary),
                tasks_worked: meta.tasks_worked,
            }),
        }
    }

    fn iteration_mut(&mut self, number: u32) -> Option<&mut Iteration> {
        self.iterations.iter_mut().find(|i| i.number == number)
    }

    fn insert_iteration(&mut self, iteration: Iteration) {
        let at = self
            .iterations
            .partition_point(|i| i.number < iteration.number);
        self.iterations.insert(at, iteration);
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// The id the next successful `task.add` will be issued.
    pub fn next_task_id(&self) -> String {
        format!("{TASK_ID_PREFIX}{}", self.task_seq + 1)
    }

    /// True if an existing non-cancelled task already carries this content.
    pub fn has_active_content(&self, content: &str) -> bool {
        self.tasks
            .values()
            .any(|t| t.status != TaskStatus::Cancelled && t.content == content)
    }

    /// Tasks in creation order (ascending id ordinal).
    pub fn tasks_ordered(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by_key(|t| task_number(&t.id).unwrap_or(u32::MAX));
        tasks
    }

    /// Pick the task the agent should work next: the highest-priority
    /// (lowest number) `remaining` task whose dependency, if any, is
    /// completed.  Ties break toward earliest creation.
    pub fn next_task(&self) -> Option<&Task> {
        self.tasks_ordered()
            .into_iter()
            .filter(|t| t.status == TaskStatus::Remaining)
            .filter(|t| match &t.depends_on {
                None => true,
                Some(dep) => self
                    .tasks
                    .get(dep)
                    .map(|d| d.status == TaskStatus::Completed)
                    .unwrap_or(false),
            })
            .min_by_key(|t| (t.priority, task_number(&t.id).unwrap_or(u32::MAX)))
    }

    /// Resolve a task id or unique id prefix to the canonical id.
    pub fn resolve_task_id(&self, query: &str) -> Result<String, StoreError> {
        if self.tasks.contains_key(query) {
            return Ok(query.to_string());
        }
        let mut matches: Vec<&str> = self
            .tasks
            .keys()
            .filter(|id| id.starts_with(query))
            .map(String::as_str)
            .collect();
        matches.sort();
        match matches.len() {
            1 => Ok(matches[0].to_string()),
            0 => Err(StoreError::NotFound(format!("task '{query}'"))),
            n => Err(StoreError::validation(format!(
                "ambiguous task id '{query}' matches {n} tasks: {}",
                matches.join(", ")
            ))),
        }
    }

    /// Resolve an inbox message id or unique prefix.
    pub fn resolve_inbox_id(&self, query: &str) -> Result<String, StoreError> {
        let mut matches: Vec<&str> = self
            .inbox
            .iter()
            .filter(|m| m.id == query || m.id.starts_with(query))
            .map(|m| m.id.as_str())
            .collect();
        if let Some(exact) = matches.iter().find(|id| **id == query) {
            return Ok(exact.to_string());
        }
        matches.sort();
        match matches.len() {
            1 => Ok(matches[0].to_string()),
            0 => Err(StoreError::NotFound(format!("message '{query}'"))),
            n => Err(StoreError::validation(format!(
                "ambiguous message id '{query}' matches {n} messages"
            ))),
        }
    }

    /// Unread inbox messages, oldest first.
    pub fn unread_inbox(&self) -> Vec<&InboxMessage> {
        self.inbox.iter().filter(|m| !m.read).collect()
    }
}

/// Ordinal of a task id (`TAS-7` → 7).
pub(crate) fn task_number(id: &str) -> Option<u32> {
    id.strip_prefix(TASK_ID_PREFIX)?.parse().ok()
}

fn parse_meta<T: serde::de::DeserializeOwned>(event: &Event) -> Option<T> {
    match serde_json::from_value(event.meta.clone()) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(kind = ?event.kind, action = %event.action, %e,
                  "skipping event with malformed meta");
            None
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
