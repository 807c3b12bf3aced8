// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_data_dir() -> String {
    ".iteratr".to_string()
}

fn default_model() -> String {
    "claude-sonnet".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model identifier forwarded verbatim to the agent runner.
    #[serde(default = "default_model")]
    pub model: String,

    /// Commit the working tree after each completed iteration.
    #[serde(default)]
    pub auto_commit: bool,

    /// Root directory for session data (event log storage lives in a
    /// subdirectory).  Relative paths resolve against the working directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Log filter directive, e.g. "info" or "iteratr_store=debug".
    #[serde(default)]
    pub log_level: Option<String>,

    /// When set, logs are appended to this file instead of stderr.
    #[serde(default)]
    pub log_file: Option<String>,

    /// Iteration cap for `build` runs.  0 means unlimited.
    #[serde(default)]
    pub iterations: u32,

    /// Run without the terminal UI, streaming agent text to stdout.
    #[serde(default)]
    pub headless: bool,

    /// Path to a prompt template file.  Empty means the built-in default.
    #[serde(default)]
    pub template: Option<String>,

    /// Agent command line to launch, e.g. "claude-agent --acp".
    /// Split on whitespace; the first word is the program.
    #[serde(default)]
    pub agent_cmd: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            auto_commit: false,
            data_dir: default_data_dir(),
            log_level: None,
            log_file: None,
            iterations: 0,
            headless: false,
            template: None,
            agent_cmd: None,
        }
    }
}

impl Config {
    /// Resolve `data_dir` to a concrete path, expanding a leading `~`.
    pub fn data_dir_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).into_owned())
    }

    /// Resolve the template path, if configured, expanding a leading `~`.
    pub fn template_path(&self) -> Option<PathBuf> {
        self.template
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| PathBuf::from(shellexpand::tilde(t).into_owned()))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = Config::default();
        assert_eq!(cfg.data_dir, ".iteratr");
        assert_eq!(cfg.iterations, 0);
        assert!(!cfg.headless);
        assert!(cfg.template.is_none());
    }

    #[test]
    fn empty_yaml_deserializes_to_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.data_dir, Config::default().data_dir);
        assert_eq!(cfg.model, Config::default().model);
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let cfg: Config = serde_yaml::from_str("iterations: 12\nheadless: true").unwrap();
        assert_eq!(cfg.iterations, 12);
        assert!(cfg.headless);
        assert_eq!(cfg.data_dir, ".iteratr");
    }

    #[test]
    fn template_path_skips_empty_string() {
        let cfg: Config = serde_yaml::from_str("template: \"\"").unwrap();
        assert!(cfg.template_path().is_none());
    }

    #[test]
    fn data_dir_path_expands_tilde() {
        let cfg: Config = serde_yaml::from_str("data_dir: \"~/iteratr-data\"").unwrap();
        let p = cfg.data_dir_path();
        assert!(!p.to_string_lossy().starts_with('~'));
    }
}
