// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones; environment variables override all files.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Global
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/iteratr/config.yaml"));
        paths.push(home.join(".config/iteratr/config.yml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("iteratr/config.yaml"));
        paths.push(cfg.join("iteratr/config.yml"));
    }

    // 2. Project-local
    paths.push(PathBuf::from(".iteratr/config.yaml"));
    paths.push(PathBuf::from(".iteratr/config.yml"));
    paths.push(PathBuf::from(".iteratr.yaml"));
    paths.push(PathBuf::from(".iteratr.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files, then applying
/// `ITERATR_*` environment variables on top.  The `extra` argument may
/// provide an explicit path (e.g. a `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    apply_env(&mut config);
    Ok(config)
}

/// Apply `ITERATR_*` environment variable overrides.  Environment beats every
/// config file layer.
fn apply_env(config: &mut Config) {
    if let Ok(v) = std::env::var("ITERATR_MODEL") {
        if !v.is_empty() {
            config.model = v;
        }
    }
    if let Ok(v) = std::env::var("ITERATR_AUTO_COMMIT") {
        config.auto_commit = parse_bool(&v).unwrap_or(config.auto_commit);
    }
    if let Ok(v) = std::env::var("ITERATR_DATA_DIR") {
        if !v.is_empty() {
            config.data_dir = v;
        }
    }
    if let Ok(v) = std::env::var("ITERATR_LOG_LEVEL") {
        if !v.is_empty() {
            config.log_level = Some(v);
        }
    }
    if let Ok(v) = std::env::var("ITERATR_LOG_FILE") {
        if !v.is_empty() {
            config.log_file = Some(v);
        }
    }
    if let Ok(v) = std::env::var("ITERATR_ITERATIONS") {
        if let Ok(n) = v.parse() {
            config.iterations = n;
        }
    }
    if let Ok(v) = std::env::var("ITERATR_HEADLESS") {
        config.headless = parse_bool(&v).unwrap_or(config.headless);
    }
    if let Ok(v) = std::env::var("ITERATR_TEMPLATE") {
        if !v.is_empty() {
            config.template = Some(v);
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
