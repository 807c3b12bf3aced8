// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Append-only, per-session event log.
//!
//! Each session subject (`events.<session>`) maps to one JSONL file under the
//! log directory.  A record's sequence number is its line ordinal, so replay
//! order is append order by construction.  Appends are flushed and synced
//! before returning: a reader that starts after a successful append always
//! observes the event.
//!
//! Live observers subscribe through [`EventLog::tail`]; the tail is backed by
//! a broadcast channel and terminates when the log is dropped or the caller
//! drops the [`EventTail`].

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::event::Event;

const TAIL_CAPACITY: usize = 256;

pub struct EventLog {
    dir: PathBuf,
    /// Next sequence number per session, lazily seeded from the file.
    seqs: Mutex<HashMap<String, u64>>,
    tail_tx: broadcast::Sender<(u64, Event)>,
}

impl EventLog {
    /// Open (or create) the log directory.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let (tail_tx, _) = broadcast::channel(TAIL_CAPACITY);
        debug!(dir = %dir.display(), "event log opened");
        Ok(Self {
            dir: dir.to_path_buf(),
            seqs: Mutex::new(HashMap::new()),
            tail_tx,
        })
    }

    /// Durably append one event.  Returns the assigned sequence number.
    ///
    /// The write is flushed and synced before returning; on success every
    /// subsequent [`replay`](Self::replay) observes the event.
    pub async fn append(&self, event: &Event) -> Result<u64, StoreError> {
        let path = self.session_path(&event.session);
        let line = serde_json::to_string(event)?;

        let seq = {
            let mut seqs = self.seqs.lock().expect("seq map poisoned");
            let next = match seqs.get(&event.session) {
                Some(n) => *n,
                None => count_lines(&path)?,
            };

            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
            file.flush()?;
            file.sync_data()?;

            seqs.insert(event.session.clone(), next + 1);
            next + 1
        };

        // Best-effort fan-out; a full or observer-less channel never fails
        // the append.
        let _ = self.tail_tx.send((seq, event.clone()));
        Ok(seq)
    }

    /// Replay the full ordered event prefix for one session.
    ///
    /// A parse failure mid-file surfaces as an error rather than a silently
    /// truncated prefix; the log itself is left unmodified.
    pub async fn replay(&self, session: &str) -> Result<Vec<(u64, Event)>, StoreError> {
        let path = self.session_path(session);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&path)?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line).map_err(|e| {
                StoreError::Permanent(format!(
                    "corrupt event at {}:{}: {e}",
                    path.display(),
                    idx + 1
                ))
            })?;
            events.push((idx as u64 + 1, event));
        }
        Ok(events)
    }

    /// Subscribe to current-and-future events for one session.
    ///
    /// The returned tail yields events appended after the call; combine with
    /// [`replay`](Self::replay) for a full history-plus-live view.  Dropping
    /// the tail releases its resources immediately.
    pub fn tail(&self, session: &str) -> EventTail {
        EventTail {
            session: session.to_string(),
            rx: self.tail_tx.subscribe(),
        }
    }

    fn session_path(&self, session: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", sanitize_subject(session)))
    }
}

/// Live event subscription for a single session, see [`EventLog::tail`].
pub struct EventTail {
    session: String,
    rx: broadcast::Receiver<(u64, Event)>,
}

impl EventTail {
    /// Next event for this session, or `None` once the log is gone.
    pub async fn next(&mut self) -> Option<(u64, Event)> {
        loop {
            match self.rx.recv().await {
                Ok((seq, event)) if event.session == self.session => return Some((seq, event)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // A slow observer misses events rather than stalling
                    // writers; the UI resyncs from replay when it cares.
                    warn!(skipped = n, session = %self.session, "event tail lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Map a session name onto a safe filesystem component.  Anything outside
/// `[A-Za-z0-9._-]` becomes `_`, which also prevents path traversal.
fn sanitize_subject(session: &str) -> String {
    session
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn count_lines(path: &Path) -> Result<u64, StoreError> {
    if !path.exists() {
        return Ok(0);
    }
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut n = 0u64;
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            n += 1;
        }
    }
    Ok(n)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, TaskAddMeta, TaskStatus};

    fn task_event(session: &str, n: u32) -> Event {
        Event::task_add(
            session,
            &TaskAddMeta {
                id: format!("TAS-{n}"),
                content: format!("task {n}"),
                status: TaskStatus::Remaining,
                priority: 2,
                iteration: 1,
            },
        )
    }

    #[tokio::test]
    async fn append_assigns_monotonic_seqs() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        let s1 = log.append(&task_event("s", 1)).await.unwrap();
        let s2 = log.append(&task_event("s", 2)).await.unwrap();
        let s3 = log.append(&task_event("s", 3)).await.unwrap();
        assert!(s1 < s2 && s2 < s3);
    }

    #[tokio::test]
    async fn replay_returns_events_in_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        for n in 1..=5 {
            log.append(&task_event("s", n)).await.unwrap();
        }
        let events = log.replay("s").await.unwrap();
        assert_eq!(events.len(), 5);
        let contents: Vec<&str> = events
            .iter()
            .map(|(_, e)| e.meta["content"].as_str().unwrap())
            .collect();
        assert_eq!(contents, vec!["task 1", "task 2", "task 3", "task 4", "task 5"]);
        // Seq numbers strictly increase.
        assert!(events.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[tokio::test]
    async fn replay_filters_by_session() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        log.append(&task_event("alpha", 1)).await.unwrap();
        log.append(&task_event("beta", 1)).await.unwrap();
        log.append(&task_event("alpha", 2)).await.unwrap();
        assert_eq!(log.replay("alpha").await.unwrap().len(), 2);
        assert_eq!(log.replay("beta").await.unwrap().len(), 1);
        assert!(log.replay("gamma").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replay_of_unknown_session_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        assert!(log.replay("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopened_log_continues_sequence() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = EventLog::open(dir.path()).unwrap();
            log.append(&task_event("s", 1)).await.unwrap();
            log.append(&task_event("s", 2)).await.unwrap();
        }
        let log = EventLog::open(dir.path()).unwrap();
        let seq = log.append(&task_event("s", 3)).await.unwrap();
        assert_eq!(seq, 3);
        assert_eq!(log.replay("s").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn tail_observes_future_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        let mut tail = log.tail("s");
        log.append(&task_event("s", 1)).await.unwrap();
        log.append(&task_event("other", 1)).await.unwrap();
        log.append(&task_event("s", 2)).await.unwrap();

        let (_, first) = tail.next().await.unwrap();
        assert_eq!(first.meta["id"], "TAS-1");
        // The "other" session's event is filtered out.
        let (_, second) = tail.next().await.unwrap();
        assert_eq!(second.session, "s");
        assert_eq!(second.meta["id"], "TAS-2");
    }

    #[tokio::test]
    async fn tail_ends_when_log_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        let mut tail = log.tail("s");
        drop(log);
        assert!(tail.next().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_line_surfaces_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        log.append(&task_event("s", 1)).await.unwrap();
        let path = dir.path().join("s.jsonl");
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "{{not json").unwrap();
        let err = log.replay("s").await.unwrap_err();
        assert!(matches!(err, StoreError::Permanent(_)));
    }

    #[test]
    fn sanitize_blocks_path_traversal() {
        assert_eq!(sanitize_subject("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_subject("my-session_1.x"), "my-session_1.x");
    }
}
