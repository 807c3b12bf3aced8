// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "iteratr",
    about = "An iterative AI coding agent orchestrator",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the iteration loop against a spec file.
    ///
    /// Each iteration projects the session state into a prompt, hands it to
    /// the agent, and records the results in the session's event log.  The
    /// loop stops when the agent calls session-complete or the iteration
    /// limit is reached; rerunning the same session resumes where it left
    /// off.
    Build {
        /// Path to the spec markdown file
        #[arg(long, required = true)]
        spec: PathBuf,

        /// Session name (one event-log subject per session)
        #[arg(long, default_value = "default")]
        name: String,

        /// Maximum iterations for this run (0 = unlimited)
        #[arg(long, short = 'n')]
        iterations: Option<u32>,

        /// Prompt template file (defaults to the built-in template;
        /// export it with gen-template)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Run headless: stream agent text to stdout, no UI
        #[arg(long, short = 'H')]
        headless: bool,

        /// Session data directory (default: .iteratr)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Model identifier forwarded to the agent
        #[arg(long, short = 'M')]
        model: Option<String>,

        /// Agent command to launch, e.g. "claude-agent --acp"
        #[arg(long)]
        agent_cmd: Option<String>,
    },

    /// Deliver a message to a session's inbox.
    ///
    /// The agent sees unread messages in its next iteration prompt.
    Message {
        /// Session name
        #[arg(long, required = true)]
        name: String,

        /// Message text (words are joined with spaces)
        #[arg(value_name = "TEXT", required = true)]
        text: Vec<String>,

        /// Session data directory (default: .iteratr)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Write the built-in prompt template to a file.
    ///
    /// The exported file can be edited and passed back via build --template.
    GenTemplate {
        /// Output path
        #[arg(long, short = 'o', default_value = ".iteratr.template")]
        output: PathBuf,
    },

    /// Print the effective merged configuration and exit
    Config,

    /// Print version information
    Version,
}
