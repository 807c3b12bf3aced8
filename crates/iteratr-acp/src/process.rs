// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! [`ProcessRunner`] — drives a real agent subprocess.
//!
//! The agent command is spawned once per session.  Frames are exchanged as
//! newline-delimited JSON: iteratr writes one `prompt` frame per iteration
//! on the agent's stdin, and the agent streams `text` / `thinking` /
//! `tool_call` frames back on stdout, ending the turn with a `finish`
//! frame.  Stderr is pumped to the log by a dedicated task so a chatty
//! agent can never block on a full pipe.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::{AgentEvent, FinishInfo, StopReason, ToolCallStatus, ToolCallUpdate};
use crate::file_change::derive_file_changes;
use crate::runner::{AgentConfig, AgentRunner};

/// Frame written to the agent's stdin.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostFrame<'a> {
    Initialize {
        model: &'a str,
        work_dir: &'a str,
        mcp_server_url: &'a str,
        mcp_server_name: &'a str,
    },
    Prompt {
        prompt: &'a str,
    },
}

/// Frame read from the agent's stdout.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AgentFrame {
    Text {
        text: String,
    },
    Thinking {
        text: String,
    },
    ToolCall {
        #[serde(flatten)]
        update: ToolCallUpdate,
    },
    Finish {
        stop_reason: StopReason,
        #[serde(default)]
        error: Option<String>,
    },
}

pub struct ProcessRunner {
    command: Vec<String>,
    config: AgentConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr_task: Option<JoinHandle<()>>,
    session_complete: Arc<AtomicBool>,
}

impl ProcessRunner {
    /// `command` is the agent argv, e.g. `["my-agent", "--acp"]`.
    pub fn new(command: Vec<String>, config: AgentConfig) -> Self {
        Self {
            command,
            config,
            child: None,
            stdin: None,
            stdout: None,
            stderr_task: None,
            session_complete: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn send_frame(&mut self, frame: &HostFrame<'_>) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("agent not started"))?;
        let mut line = serde_json::to_string(frame)?;
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .await
            .context("writing frame to agent stdin")?;
        stdin.flush().await.context("flushing agent stdin")?;
        Ok(())
    }
}

#[async_trait]
impl AgentRunner for ProcessRunner {
    async fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            bail!("agent already started");
        }
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("empty agent command"))?;

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .current_dir(&self.config.work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning agent command {program:?}"))?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow!("no agent stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("no agent stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("no agent stderr"))?;

        // Dedicated stderr pump: agent diagnostics land in our log.
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "agent", "{line}");
            }
        });

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout).lines());
        self.stderr_task = Some(stderr_task);
        self.child = Some(child);

        let config = self.config.clone();
        let work_dir = config.work_dir.to_string_lossy().into_owned();
        self.send_frame(&HostFrame::Initialize {
            model: &config.model,
            work_dir: &work_dir,
            mcp_server_url: &config.mcp_server_url,
            mcp_server_name: &config.mcp_server_name,
        })
        .await?;
        debug!(model = %self.config.model, "agent started");
        Ok(())
    }

    async fn run_iteration(
        &mut self,
        prompt: &str,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<()> {
        let started = Instant::now();
        self.send_frame(&HostFrame::Prompt { prompt }).await?;

        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| anyhow!("agent not started"))?;

        loop {
            let line = stdout
                .next_line()
                .await
                .context("reading agent stdout")?
                .ok_or_else(|| anyhow!("agent closed its stream mid-iteration"))?;
            if line.trim().is_empty() {
                continue;
            }

            let frame: AgentFrame = match serde_json::from_str(&line) {
                Ok(frame) => frame,
                Err(e) => {
                    // A malformed frame is the agent's bug, not a reason to
                    // lose the iteration.
                    warn!(%e, "skipping malformed agent frame");
                    continue;
                }
            };

            match frame {
                AgentFrame::Text { text } => {
                    let _ = events.send(AgentEvent::Text(text)).await;
                }
                AgentFrame::Thinking { text } => {
                    let _ = events.send(AgentEvent::Thinking(text)).await;
                }
                AgentFrame::ToolCall { update } => {
                    if update.status == ToolCallStatus::Completed
                        && update.title == "session-complete"
                    {
                        self.session_complete.store(true, Ordering::SeqCst);
                    }
                    let changes = derive_file_changes(&update);
                    let _ = events.send(AgentEvent::ToolCall(update)).await;
                    for change in changes {
                        let _ = events.send(AgentEvent::FileChange(change)).await;
                    }
                }
                AgentFrame::Finish { stop_reason, error } => {
                    let info = FinishInfo {
                        stop_reason,
                        error: error.clone(),
                        duration: started.elapsed(),
                        model: self.config.model.clone(),
                    };
                    let _ = events.send(AgentEvent::Finish(info)).await;
                    if stop_reason.is_failure() {
                        bail!(
                            "agent stopped with {stop_reason}: {}",
                            error.unwrap_or_else(|| "no detail".to_string())
                        );
                    }
                    return Ok(());
                }
            }
        }
    }

    fn is_session_complete(&self) -> bool {
        self.session_complete.load(Ordering::SeqCst)
    }

    async fn stop(&mut self) {
        self.stdin = None; // closes the agent's stdin
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        self.stdout = None;
        debug!("agent stopped");
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
//
// The frame protocol is exercised against small shell scripts standing in
// for the agent binary; no network or real model involved.

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config() -> AgentConfig {
        AgentConfig::new(
            "mock-model",
            PathBuf::from("/tmp"),
            "http://localhost:1/mcp",
        )
    }

    fn sh_runner(script: &str) -> ProcessRunner {
        ProcessRunner::new(
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            config(),
        )
    }

    async fn drain(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn text_and_finish_frames_become_events() {
        // Consume the initialize and prompt frames, then answer.
        let script = r#"read init; read prompt
printf '%s\n' '{"type":"text","text":"working on it"}'
printf '%s\n' '{"type":"finish","stop_reason":"end_turn"}'
"#;
        let mut runner = sh_runner(script);
        runner.start().await.unwrap();

        let (tx, rx) = mpsc::channel(16);
        runner.run_iteration("do the thing", tx).await.unwrap();
        runner.stop().await;

        let events = drain(rx).await;
        assert!(matches!(&events[0], AgentEvent::Text(t) if t == "working on it"));
        assert!(matches!(
            &events[1],
            AgentEvent::Finish(f) if f.stop_reason == StopReason::EndTurn
        ));
    }

    #[tokio::test]
    async fn completed_session_complete_tool_sets_flag() {
        let script = r#"read init; read prompt
printf '%s\n' '{"type":"tool_call","tool_call_id":"tc1","title":"session-complete","status":"completed"}'
printf '%s\n' '{"type":"finish","stop_reason":"end_turn"}'
"#;
        let mut runner = sh_runner(script);
        runner.start().await.unwrap();
        assert!(!runner.is_session_complete());

        let (tx, _rx) = mpsc::channel(16);
        runner.run_iteration("p", tx).await.unwrap();
        assert!(runner.is_session_complete());
        runner.stop().await;
    }

    #[tokio::test]
    async fn edit_tool_call_emits_file_change() {
        let script = r#"read init; read prompt
printf '%s\n' '{"type":"tool_call","tool_call_id":"tc1","title":"edit file","status":"completed","kind":"edit","diffs":[{"path":"/w/a.rs","old_text":"","new_text":"fn a() {}"}]}'
printf '%s\n' '{"type":"finish","stop_reason":"end_turn"}'
"#;
        let mut runner = sh_runner(script);
        runner.start().await.unwrap();
        let (tx, rx) = mpsc::channel(16);
        runner.run_iteration("p", tx).await.unwrap();
        runner.stop().await;

        let events = drain(rx).await;
        let change = events
            .iter()
            .find_map(|e| match e {
                AgentEvent::FileChange(c) => Some(c),
                _ => None,
            })
            .expect("file change derived from edit call");
        assert!(change.is_new);
        assert_eq!(change.abs_path, PathBuf::from("/w/a.rs"));
    }

    #[tokio::test]
    async fn refusal_finish_is_an_error() {
        let script = r#"read init; read prompt
printf '%s\n' '{"type":"finish","stop_reason":"refusal","error":"cannot comply"}'
"#;
        let mut runner = sh_runner(script);
        runner.start().await.unwrap();
        let (tx, _rx) = mpsc::channel(16);
        let err = runner.run_iteration("p", tx).await.unwrap_err();
        assert!(err.to_string().contains("refusal"));
        runner.stop().await;
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let script = r#"read init; read prompt
printf '%s\n' 'not json at all'
printf '%s\n' '{"type":"finish","stop_reason":"end_turn"}'
"#;
        let mut runner = sh_runner(script);
        runner.start().await.unwrap();
        let (tx, _rx) = mpsc::channel(16);
        assert!(runner.run_iteration("p", tx).await.is_ok());
        runner.stop().await;
    }

    #[tokio::test]
    async fn early_exit_surfaces_as_error() {
        let script = r#"read init; read prompt"#;
        let mut runner = sh_runner(script);
        runner.start().await.unwrap();
        let (tx, _rx) = mpsc::channel(16);
        let err = runner.run_iteration("p", tx).await.unwrap_err();
        assert!(err.to_string().contains("closed its stream"));
        runner.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut runner = sh_runner("read init; sleep 60");
        runner.start().await.unwrap();
        runner.stop().await;
        runner.stop().await;
    }
}
