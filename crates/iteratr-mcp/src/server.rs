// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! [`ToolServer`] — lifecycle and HTTP plumbing for the tool endpoint.
//!
//! The server binds `127.0.0.1` on a kernel-chosen free port and serves
//! `POST /mcp` statelessly: every request executes one tool in isolation.
//! The listener is handed straight to axum, so the port is owned from bind
//! to shutdown with no re-bind race.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use iteratr_tools::{ToolCall, ToolRegistry};

use crate::wire::{output_to_response, ToolRequest, ToolResponse};

struct Running {
    port: u16,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// In-process HTTP server hosting the session tools.
pub struct ToolServer {
    registry: Arc<ToolRegistry>,
    running: Mutex<Option<Running>>,
}

impl ToolServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            running: Mutex::new(None),
        }
    }

    /// Bind a free port and begin serving in a background task.
    /// Returns the bound port.  A second call fails with "already started".
    pub async fn start(&self) -> Result<u16> {
        if self.running.lock().expect("server state poisoned").is_some() {
            return Err(anyhow!("already started"));
        }

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();

        let app = Router::new()
            .route("/mcp", post(handle_tool_call))
            .with_state(self.registry.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::warn!(%e, "tool server exited with error");
            }
        });

        let mut running = self.running.lock().expect("server state poisoned");
        if running.is_some() {
            // A concurrent start won the race; give back the port.
            handle.abort();
            return Err(anyhow!("already started"));
        }
        *running = Some(Running {
            port,
            shutdown_tx,
            handle,
        });
        debug!(port, "tool server started");
        Ok(port)
    }

    /// Graceful shutdown.  Idempotent; concurrent callers all succeed.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .expect("server state poisoned")
            .take();
        let Some(running) = running else {
            return;
        };
        let _ = running.shutdown_tx.send(());
        let _ = running.handle.await;
        debug!(port = running.port, "tool server stopped");
    }

    /// The endpoint the agent is pointed at, once started.
    pub fn url(&self) -> Option<String> {
        self.running
            .lock()
            .expect("server state poisoned")
            .as_ref()
            .map(|r| format!("http://localhost:{}/mcp", r.port))
    }
}

async fn handle_tool_call(
    State(registry): State<Arc<ToolRegistry>>,
    Json(request): Json<ToolRequest>,
) -> Json<ToolResponse> {
    let call = ToolCall {
        id: Uuid::new_v4().to_string(),
        name: request.name,
        args: request.arguments,
    };
    debug!(tool = %call.name, "tool call");
    let output = registry.execute(&call).await;
    Json(output_to_response(output))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
//
// Lifecycle-only tests; full wire round-trips live in tests/integration.rs.
