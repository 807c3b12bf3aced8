// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Typed mutators over the event log.
//!
//! Every mutator validates its inputs, performs any read-then-append id
//! derivation under the store's write lock, and appends exactly one event
//! per logical change (batch adds append one event per task).  Validation
//! failures are returned to the caller and never retried; transient log
//! failures are retried under the default [`RetryPolicy`].

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::event::{
    Event, InboxAddMeta, InboxMarkReadMeta, IterationSummaryMeta, NoteAddMeta, NoteType,
    TaskAddMeta, TaskStatus, TaskUpdateMeta,
};
use crate::log::EventLog;
use crate::retry::{with_retry, RetryPolicy};
use crate::state::{InboxMessage, Note, State, Task};

/// Priorities run 0 (critical) through 4 (backlog).
pub const MAX_PRIORITY: u8 = 4;
const DEFAULT_PRIORITY: u8 = 2;

#[derive(Debug, Clone, Default)]
pub struct TaskAddParams {
    pub content: String,
    pub status: Option<TaskStatus>,
    pub priority: Option<u8>,
    pub iteration: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdateParams {
    pub status: Option<TaskStatus>,
    pub priority: Option<u8>,
    pub depends_on: Option<String>,
}

pub struct Store {
    log: Arc<EventLog>,
    retry: RetryPolicy,
    /// Serializes read-then-append id allocation.  There is one writer
    /// process per session, so a per-store lock is sufficient to keep task
    /// ids gapless when tool handlers race the orchestrator.
    write_lock: tokio::sync::Mutex<()>,
}

impl Store {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            log,
            retry: RetryPolicy::default(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The underlying log, for live tails.
    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// Replay all events for `session` and fold them into a [`State`].
    pub async fn load_state(&self, session: &str) -> Result<State, StoreError> {
        let events = self.log.replay(session).await?;
        let mut state = State::new(session);
        for (_, event) in &events {
            state.apply(event);
        }
        Ok(state)
    }

    // ── Tasks ────────────────────────────────────────────────────────────────

    /// Create one task.  Content must be non-empty and not duplicate an
    /// existing non-cancelled task's content.
    pub async fn task_add(
        &self,
        session: &str,
        params: TaskAddParams,
    ) -> Result<Task, StoreError> {
        let mut tasks = self.task_batch_add(session, vec![params]).await?;
        Ok(tasks.remove(0))
    }

    /// Create several tasks in list order.  Validation is all-or-nothing:
    /// no event is appended unless every entry passes.
    pub async fn task_batch_add(
        &self,
        session: &str,
        params: Vec<TaskAddParams>,
    ) -> Result<Vec<Task>, StoreError> {
        if params.is_empty() {
            return Err(StoreError::validation("no tasks given"));
        }

        let _guard = self.write_lock.lock().await;
        let state = self.load_state(session).await?;
        let current_iteration = state.iterations.last().map(|i| i.number).unwrap_or(0);

        // Validate the whole batch before appending anything.
        let mut seen = Vec::new();
        for p in &params {
            let content = p.content.trim();
            if content.is_empty() {
                return Err(StoreError::validation("task content must not be empty"));
            }
            if let Some(prio) = p.priority {
                if prio > MAX_PRIORITY {
                    return Err(StoreError::validation(format!(
                        "priority must be 0-{MAX_PRIORITY}, got {prio}"
                    )));
                }
            }
            if state.has_active_content(content) || seen.contains(&content) {
                return Err(StoreError::validation(format!(
                    "task with content '{content}' already exists"
                )));
            }
            seen.push(content);
        }

        let mut created = Vec::with_capacity(params.len());
        let mut folded = state;
        for p in params {
            let meta = TaskAddMeta {
                id: folded.next_task_id(),
                content: p.content.trim().to_string(),
                status: p.status.unwrap_or_default(),
                priority: p.priority.unwrap_or(DEFAULT_PRIORITY),
                iteration: p.iteration.unwrap_or(current_iteration),
            };
            let event = Event::task_add(session, &meta);
            self.append(&event).await?;
            folded.apply(&event);
            created.push(Task {
                id: meta.id,
                content: meta.content,
                status: meta.status,
                priority: meta.priority,
                depends_on: None,
                iteration: meta.iteration,
            });
        }
        debug!(session, count = created.len(), "tasks added");
        Ok(created)
    }

    /// Update a task addressed by id or unique id prefix.  Completed and
    /// cancelled tasks accept no further status transitions.
    pub async fn task_update(
        &self,
        session: &str,
        id: &str,
        params: TaskUpdateParams,
    ) -> Result<Task, StoreError> {
        if params.status.is_none() && params.priority.is_none() && params.depends_on.is_none() {
            return Err(StoreError::validation("no fields to update"));
        }
        if let Some(prio) = params.priority {
            if prio > MAX_PRIORITY {
                return Err(StoreError::validation(format!(
                    "priority must be 0-{MAX_PRIORITY}, got {prio}"
                )));
            }
        }

        let _guard = self.write_lock.lock().await;
        let state = self.load_state(session).await?;
        let id = state.resolve_task_id(id)?;
        let task = state
            .tasks
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("task '{id}'")))?;

        if params.status.is_some() && task.status.is_terminal() {
            return Err(StoreError::validation(format!(
                "task {id} is {} and cannot change status",
                task.status
            )));
        }

        let depends_on = match params.depends_on {
            Some(dep) if dep.is_empty() => Some(String::new()), // explicit clear
            Some(dep) => {
                let dep = state.resolve_task_id(&dep)?;
                if dep == id {
                    return Err(StoreError::validation(format!(
                        "task {id} cannot depend on itself"
                    )));
                }
                Some(dep)
            }
            None => None,
        };

        let meta = TaskUpdateMeta {
            id: id.clone(),
            status: params.status,
            priority: params.priority,
            depends_on,
            iteration: Some(state.iterations.last().map(|i| i.number).unwrap_or(0)),
        };
        let event = Event::task_update(session, &meta);
        self.append(&event).await?;

        let mut folded = state;
        folded.apply(&event);
        folded
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("task '{id}'")))
    }

    // ── Notes ────────────────────────────────────────────────────────────────

    pub async fn note_add(
        &self,
        session: &str,
        content: &str,
        note_type: NoteType,
    ) -> Result<Note, StoreError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::validation("note content must not be empty"));
        }
        let state = self.load_state(session).await?;
        let meta = NoteAddMeta {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            note_type,
            iteration: state.iterations.last().map(|i| i.number).unwrap_or(0),
        };
        self.append(&Event::note_add(session, &meta)).await?;
        Ok(Note {
            id: meta.id,
            content: meta.content,
            note_type,
            iteration: meta.iteration,
        })
    }

    // ── Inbox ────────────────────────────────────────────────────────────────

    pub async fn inbox_add(
        &self,
        session: &str,
        content: &str,
    ) -> Result<InboxMessage, StoreError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::validation("message must not be empty"));
        }
        let meta = InboxAddMeta {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
        };
        let event = Event::inbox_add(session, &meta);
        let timestamp = event.timestamp;
        self.append(&event).await?;
        Ok(InboxMessage {
            id: meta.id,
            content: meta.content,
            read: false,
            created_at: timestamp,
        })
    }

    pub async fn inbox_mark_read(&self, session: &str, id: &str) -> Result<(), StoreError> {
        let state = self.load_state(session).await?;
        let id = state.resolve_inbox_id(id)?;
        self.append(&Event::inbox_mark_read(session, &InboxMarkReadMeta { id }))
            .await?;
        Ok(())
    }

    // ── Iterations ───────────────────────────────────────────────────────────

    /// Record the start of iteration `n`.  The orchestrator is authoritative
    /// for the numbering; `n` is accepted verbatim.
    pub async fn iteration_start(&self, session: &str, n: u32) -> Result<(), StoreError> {
        self.append(&Event::iteration_start(session, n)).await?;
        Ok(())
    }

    pub async fn iteration_complete(&self, session: &str, n: u32) -> Result<(), StoreError> {
        self.append(&Event::iteration_complete(session, n)).await?;
        Ok(())
    }

    pub async fn iteration_summary(
        &self,
        session: &str,
        n: u32,
        summary: &str,
        tasks_worked: Vec<String>,
    ) -> Result<(), StoreError> {
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(StoreError::validation("summary must not be empty"));
        }
        let meta = IterationSummaryMeta {
            number: n,
            summary: summary.to_string(),
            tasks_worked,
        };
        self.append(&Event::iteration_summary(session, &meta)).await?;
        Ok(())
    }

    // ── Control ──────────────────────────────────────────────────────────────

    pub async fn session_complete(&self, session: &str) -> Result<(), StoreError> {
        self.append(&Event::session_complete(session)).await?;
        Ok(())
    }

    /// Record a fatal agent failure (stop reason `error` or `refusal`).
    pub async fn agent_error(&self, session: &str, message: &str) -> Result<(), StoreError> {
        self.append(&Event::agent_error(session, message)).await?;
        Ok(())
    }

    async fn append(&self, event: &Event) -> Result<u64, StoreError> {
        with_retry(&self.retry, "event append", || self.log.append(event)).await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    async fn store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(EventLog::open(dir.path()).unwrap());
        (Store::new(log), dir)
    }

    fn add(content: &str) -> TaskAddParams {
        TaskAddParams {
            content: content.into(),
            ..Default::default()
        }
    }

    fn add_prio(content: &str, priority: u8) -> TaskAddParams {
        TaskAddParams {
            content: content.into(),
            priority: Some(priority),
            ..Default::default()
        }
    }

    // ── Add / complete / list ────────────────────────────────────────────────

    #[tokio::test]
    async fn add_complete_and_pick_next() {
        let (store, _dir) = store().await;
        let a = store.task_add("s", add_prio("A", 2)).await.unwrap();
        let b = store.task_add("s", add_prio("B", 1)).await.unwrap();
        assert_eq!(a.id, "TAS-1");
        assert_eq!(b.id, "TAS-2");

        // Higher priority (lower number) wins.
        let state = store.load_state("s").await.unwrap();
        let next = state.next_task().unwrap();
        assert_eq!(next.id, "TAS-2");
        assert_eq!(next.content, "B");
        assert_eq!(next.priority, 1);

        store
            .task_update(
                "s",
                "TAS-2",
                TaskUpdateParams {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let state = store.load_state("s").await.unwrap();
        assert_eq!(state.tasks["TAS-2"].status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn task_ids_are_gapless_in_stream_order() {
        let (store, _dir) = store().await;
        for n in 1..=6 {
            let t = store.task_add("s", add(&format!("task {n}"))).await.unwrap();
            assert_eq!(t.id, format!("TAS-{n}"));
        }
    }

    // ── Duplicate rejection ──────────────────────────────────────────────────

    #[tokio::test]
    async fn duplicate_content_is_rejected_and_not_appended() {
        let (store, _dir) = store().await;
        store.task_add("s", add("A")).await.unwrap();
        let err = store.task_add("s", add("A")).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let events = store.log().replay("s").await.unwrap();
        assert_eq!(events.len(), 1, "the rejected add must not be appended");
    }

    #[tokio::test]
    async fn batch_add_is_all_or_nothing_at_validation() {
        let (store, _dir) = store().await;
        store.task_add("s", add("existing")).await.unwrap();
        let err = store
            .task_batch_add("s", vec![add("fresh"), add("existing")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        // Neither batch entry was appended.
        assert_eq!(store.log().replay("s").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn batch_add_rejects_in_batch_duplicates() {
        let (store, _dir) = store().await;
        let err = store
            .task_batch_add("s", vec![add("x"), add("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let (store, _dir) = store().await;
        assert!(store.task_add("s", add("   ")).await.is_err());
        assert!(store.note_add("s", "", NoteType::Tip).await.is_err());
        assert!(store.inbox_add("s", " ").await.is_err());
        assert!(store.iteration_summary("s", 1, "", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn priority_out_of_range_is_rejected() {
        let (store, _dir) = store().await;
        let err = store.task_add("s", add_prio("A", 9)).await.unwrap_err();
        assert!(err.to_string().contains("priority"));
    }

    // ── Updates ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn update_accepts_unique_prefix() {
        let (store, _dir) = store().await;
        store.task_add("s", add("A")).await.unwrap();
        let t = store
            .task_update(
                "s",
                "TAS",
                TaskUpdateParams {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(t.id, "TAS-1");
        assert_eq!(t.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn update_unknown_id_is_rejected_at_write_time() {
        let (store, _dir) = store().await;
        let err = store
            .task_update(
                "s",
                "TAS-7",
                TaskUpdateParams {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.log().replay("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn terminal_status_rejects_further_transitions() {
        let (store, _dir) = store().await;
        store.task_add("s", add("A")).await.unwrap();
        store
            .task_update(
                "s",
                "TAS-1",
                TaskUpdateParams {
                    status: Some(TaskStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = store
            .task_update(
                "s",
                "TAS-1",
                TaskUpdateParams {
                    status: Some(TaskStatus::Remaining),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn depends_on_must_reference_existing_task() {
        let (store, _dir) = store().await;
        store.task_add("s", add("A")).await.unwrap();
        let err = store
            .task_update(
                "s",
                "TAS-1",
                TaskUpdateParams {
                    depends_on: Some("TAS-9".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = store
            .task_update(
                "s",
                "TAS-1",
                TaskUpdateParams {
                    depends_on: Some("TAS-1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("itself"));
    }

    // ── Inbox ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn inbox_add_and_mark_read() {
        let (store, _dir) = store().await;
        let msg = store.inbox_add("s", "please also add docs").await.unwrap();
        assert!(!msg.read);

        store.inbox_mark_read("s", &msg.id).await.unwrap();
        let state = store.load_state("s").await.unwrap();
        assert!(state.inbox[0].read);
        assert!(state.unread_inbox().is_empty());
    }

    // ── Session complete ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn session_complete_twice_stores_two_events_one_state() {
        let (store, _dir) = store().await;
        store.session_complete("s").await.unwrap();
        let state_once = store.load_state("s").await.unwrap();
        store.session_complete("s").await.unwrap();
        let state_twice = store.load_state("s").await.unwrap();

        assert!(state_once.complete && state_twice.complete);
        assert_eq!(state_once.tasks, state_twice.tasks);
        assert_eq!(state_once.iterations, state_twice.iterations);
        assert_eq!(store.log().replay("s").await.unwrap().len(), 2);
    }

    // ── Iterations ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn iteration_events_fold_in_append_order() {
        let (store, _dir) = store().await;
        store.iteration_start("s", 1).await.unwrap();
        store
            .iteration_summary("s", 1, "groundwork", vec!["TAS-1".into()])
            .await
            .unwrap();
        store.iteration_complete("s", 1).await.unwrap();
        store.iteration_start("s", 2).await.unwrap();

        // The log delivered events in append order.
        let events = store.log().replay("s").await.unwrap();
        let actions: Vec<&str> = events.iter().map(|(_, e)| e.action.as_str()).collect();
        assert_eq!(actions, vec!["start", "summary", "complete", "start"]);
        assert!(events.iter().all(|(_, e)| e.kind == EventKind::Iteration));

        let state = store.load_state("s").await.unwrap();
        assert_eq!(state.iterations.len(), 2);
        assert!(state.iterations[0].complete);
        assert!(!state.iterations[1].complete);
    }

    #[tokio::test]
    async fn new_tasks_are_stamped_with_current_iteration() {
        let (store, _dir) = store().await;
        store.iteration_start("s", 1).await.unwrap();
        store.iteration_complete("s", 1).await.unwrap();
        store.iteration_start("s", 2).await.unwrap();
        let t = store.task_add("s", add("late task")).await.unwrap();
        assert_eq!(t.iteration, 2);
    }
}
