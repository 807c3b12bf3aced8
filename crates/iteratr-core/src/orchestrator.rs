// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! The orchestrator: owns the event log, store, tool server and agent
//! runner, and drives the iteration loop.
//!
//! Per iteration it records `iteration.start`, projects the session state
//! into a prompt, hands the prompt to the agent, streams the reply, records
//! `iteration.complete`, and checks the stop conditions.  A failed agent
//! turn leaves its iteration without a `complete` event and aborts the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use iteratr_acp::{AgentEvent, AgentRunner};
use iteratr_mcp::ToolServer;
use iteratr_store::{EventLog, EventTail, Store};
use iteratr_tools::session_registry;

use crate::output::{write_progress, write_stdout};
use crate::prompt::{build_prompt, PromptInput};

/// Grace period for the tool server to drain in-flight requests.
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub session: String,
    pub spec_path: PathBuf,
    /// `None` selects the built-in default template.
    pub template_path: Option<PathBuf>,
    /// 0 means unlimited.
    pub iteration_cap: u32,
    /// Extra text appended to the prompt via the `{{extra}}` placeholder.
    pub extra: Option<String>,
    /// When set, all agent events are forwarded here (the TUI); otherwise
    /// assistant text is written to stdout.
    pub event_sink: Option<mpsc::Sender<AgentEvent>>,
}

#[derive(Debug)]
pub struct RunOutcome {
    /// Iterations completed during this run.
    pub iterations_run: u32,
    /// User-facing reason the loop stopped.
    pub message: String,
}

/// The store, tool server and endpoint produced by [`bootstrap`].
pub struct Bootstrap {
    pub store: Arc<Store>,
    pub server: Arc<ToolServer>,
    pub url: String,
}

/// Startup sequence: create the data directory, open the event log, build
/// the store, register the session tools and start the tool server.
pub async fn bootstrap(data_dir: &Path, session: &str) -> Result<Bootstrap> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let log = Arc::new(EventLog::open(&data_dir.join("events"))?);
    let store = Arc::new(Store::new(log));
    let registry = Arc::new(session_registry(store.clone(), session));
    let server = Arc::new(ToolServer::new(registry));
    let port = server.start().await.context("starting tool server")?;
    let url = format!("http://localhost:{port}/mcp");
    debug!(session, %url, "orchestrator bootstrapped");
    Ok(Bootstrap { store, server, url })
}

pub struct Orchestrator {
    store: Arc<Store>,
    server: Arc<ToolServer>,
    runner: Box<dyn AgentRunner>,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(
        store: Arc<Store>,
        server: Arc<ToolServer>,
        runner: Box<dyn AgentRunner>,
        options: RunOptions,
    ) -> Self {
        Self {
            store,
            server,
            runner,
            options,
        }
    }

    /// Live view of this session's events, for the UI collaborator.
    pub fn tail(&self) -> EventTail {
        self.store.log().tail(&self.options.session)
    }

    /// Run the iteration loop until the agent completes the session, the
    /// iteration cap is reached, or an iteration fails.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        let session = self.options.session.clone();
        let spec_path = self.options.spec_path.clone();
        let template_path = self.options.template_path.clone();
        let extra = self.options.extra.clone();
        let cap = self.options.iteration_cap;

        let state = self.store.load_state(&session).await?;
        if state.complete {
            return Ok(RunOutcome {
                iterations_run: 0,
                message: format!("Session '{session}' is already marked as complete"),
            });
        }

        self.runner.start().await.context("starting agent")?;

        let start_iter = state.iterations.len() as u32 + 1;
        let mut iterations_run = 0u32;
        let mut i = start_iter;
        let message = loop {
            if cap > 0 && i - start_iter >= cap {
                break format!("Reached iteration limit of {cap}");
            }

            self.store.iteration_start(&session, i).await?;
            write_progress(&format!("[iteratr:iteration:start] #{i} session={session}"));

            let prompt = build_prompt(
                &self.store,
                PromptInput {
                    session: &session,
                    iteration: i,
                    spec_path: &spec_path,
                    template_path: template_path.as_deref(),
                    extra: extra.as_deref(),
                },
            )
            .await?;

            let (tx, rx) = mpsc::channel::<AgentEvent>(256);
            let consumer = spawn_event_consumer(rx, self.options.event_sink.clone());
            let result = self.runner.run_iteration(&prompt, tx).await;
            // tx is dropped by run_iteration's return; the consumer drains
            // the channel and exits.
            if let Err(join_err) = consumer.await {
                if join_err.is_panic() {
                    warn!(%join_err, "event consumer panicked; output for this iteration may be incomplete");
                }
            }

            if let Err(e) = result {
                // The iteration is deliberately left without a complete
                // event; a later resume re-runs this number.
                if let Err(log_err) = self.store.agent_error(&session, &e.to_string()).await {
                    warn!(%log_err, "failed to record agent error event");
                }
                return Err(e).with_context(|| format!("iteration {i} failed"));
            }

            self.store.iteration_complete(&session, i).await?;
            iterations_run += 1;
            write_progress(&format!("[iteratr:iteration:complete] #{i}"));

            if self.runner.is_session_complete() {
                break format!("Session '{session}' marked as complete by agent");
            }
            i += 1;
        };

        Ok(RunOutcome {
            iterations_run,
            message,
        })
    }

    /// Stop the agent and the tool server.  Idempotent; failures are
    /// aggregated rather than thrown.
    pub async fn shutdown(&mut self) -> std::result::Result<(), MultiError> {
        let mut errors = MultiError::default();

        self.runner.stop().await;

        if tokio::time::timeout(SERVER_STOP_TIMEOUT, self.server.stop())
            .await
            .is_err()
        {
            errors.push(format!(
                "tool server did not stop within {SERVER_STOP_TIMEOUT:?}"
            ));
        }

        // The event log has no background tasks; dropping the store's
        // reference closes it.
        errors.into_result()
    }
}

fn spawn_event_consumer(
    mut rx: mpsc::Receiver<AgentEvent>,
    sink: Option<mpsc::Sender<AgentEvent>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match &sink {
                Some(tx) => {
                    let _ = tx.send(event).await;
                }
                None => {
                    if let AgentEvent::Text(text) = &event {
                        write_stdout(text);
                    }
                }
            }
        }
    })
}

/// Aggregate of independent shutdown failures.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<String>,
}

impl MultiError {
    pub fn push(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn into_result(self) -> std::result::Result<(), MultiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} error(s) during shutdown: {}",
            self.errors.len(),
            self.errors.join("; ")
        )
    }
}

impl std::error::Error for MultiError {}

// ─── Unit tests ──────────────────────────────────────────────────────────────
