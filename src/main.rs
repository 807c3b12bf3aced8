// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use iteratr_acp::{AgentConfig, ProcessRunner};
use iteratr_config::Config;
use iteratr_core::output::write_stderr;
use iteratr_core::{bootstrap, Orchestrator, RunOptions, DEFAULT_TEMPLATE};
use iteratr_store::{EventLog, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = iteratr_config::load(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Commands::Build {
            spec,
            name,
            iterations,
            template,
            headless,
            data_dir,
            model,
            agent_cmd,
        } => {
            let mut config = config;
            if let Some(m) = model {
                config.model = m;
            }
            if headless {
                config.headless = true;
            }
            run_build(
                &config,
                &spec,
                &name,
                iterations,
                template,
                data_dir,
                agent_cmd,
            )
            .await
        }
        Commands::Message {
            name,
            text,
            data_dir,
        } => run_message(&config, &name, &text.join(" "), data_dir).await,
        Commands::GenTemplate { output } => gen_template(&output),
        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Version => {
            println!("iteratr {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Configure tracing from config/env: ITERATR_LOG_LEVEL selects the filter,
/// ITERATR_LOG_FILE redirects output away from stderr so it never mixes with
/// the agent's streamed text.
fn init_logging(config: &Config) {
    let filter = match &config.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    match &config.log_file {
        Some(path) => {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(file) => {
                    tracing_subscriber::fmt()
                        .with_env_filter(filter)
                        .with_writer(file)
                        .with_ansi(false)
                        .init();
                }
                Err(e) => {
                    eprintln!("warning: cannot open log file {path}: {e}");
                    tracing_subscriber::fmt()
                        .with_env_filter(filter)
                        .with_writer(std::io::stderr)
                        .init();
                }
            }
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ── build ─────────────────────────────────────────────────────────────────────

async fn run_build(
    config: &Config,
    spec: &Path,
    session: &str,
    iterations: Option<u32>,
    template: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    agent_cmd: Option<String>,
) -> anyhow::Result<()> {
    if !spec.is_file() {
        return Err(anyhow!("spec file not found: {}", spec.display()));
    }

    let data_dir = data_dir.unwrap_or_else(|| config.data_dir_path());
    let boot = bootstrap(&data_dir, session).await?;

    let agent_cmd = agent_cmd
        .or_else(|| config.agent_cmd.clone())
        .ok_or_else(|| anyhow!("no agent command configured (set agent_cmd or --agent-cmd)"))?;
    let command: Vec<String> = agent_cmd.split_whitespace().map(String::from).collect();
    if command.is_empty() {
        return Err(anyhow!("agent command is empty"));
    }

    let work_dir = std::env::current_dir().context("resolving working directory")?;
    let runner = ProcessRunner::new(command, AgentConfig::new(&config.model, work_dir, &boot.url));

    let options = RunOptions {
        session: session.to_string(),
        spec_path: spec.to_path_buf(),
        template_path: template.or_else(|| config.template_path()),
        iteration_cap: iterations.unwrap_or(config.iterations),
        extra: None,
        event_sink: None,
    };

    let mut orchestrator = Orchestrator::new(boot.store, boot.server, Box::new(runner), options);
    let result = orchestrator.run().await;

    // Shutdown failures are reported, never thrown over the run result.
    if let Err(e) = orchestrator.shutdown().await {
        write_stderr(&format!("[iteratr:shutdown] {e}"));
    }

    let outcome = result?;
    println!("{}", outcome.message);
    Ok(())
}

// ── message ───────────────────────────────────────────────────────────────────

async fn run_message(
    config: &Config,
    session: &str,
    text: &str,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let data_dir = data_dir.unwrap_or_else(|| config.data_dir_path());
    let log = Arc::new(EventLog::open(&data_dir.join("events"))?);
    let store = Store::new(log);
    store.inbox_add(session, text).await?;
    println!("Message delivered to session '{session}'");
    Ok(())
}

// ── gen-template ──────────────────────────────────────────────────────────────

fn gen_template(output: &Path) -> anyhow::Result<()> {
    std::fs::write(output, DEFAULT_TEMPLATE)
        .with_context(|| format!("writing template to {}", output.display()))?;
    println!("Template written to {}", output.display());
    Ok(())
}
