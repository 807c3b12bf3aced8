// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Prompt projection: reduce session [`State`] into named text fragments and
//! interpolate them into the prompt template.
//!
//! All fragments are deterministic functions of the state, so the same event
//! prefix always produces the same prompt (modulo the `history` time-ago
//! labels, which depend on the clock).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use iteratr_store::{State, Store, TaskStatus};

use crate::template::apply_template;

/// The built-in prompt template.  `gen-template` exports these exact bytes,
/// so a round trip through `--template` reproduces the default prompt
/// byte-identically.
pub const DEFAULT_TEMPLATE: &str = include_str!("templates/default.md");

/// How many summarized iterations the history fragment shows.
const HISTORY_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    pub session: &'a str,
    pub iteration: u32,
    pub spec_path: &'a Path,
    /// `None` selects the built-in default template.
    pub template_path: Option<&'a Path>,
    pub extra: Option<&'a str>,
}

/// Build the prompt for one iteration.
pub async fn build_prompt(store: &Store, input: PromptInput<'_>) -> Result<String> {
    let template = match input.template_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading template {}", path.display()))?,
        None => DEFAULT_TEMPLATE.to_string(),
    };

    let spec = std::fs::read_to_string(input.spec_path)
        .with_context(|| format!("spec file not found: {}", input.spec_path.display()))?;

    let state = store.load_state(input.session).await?;
    let now = Utc::now();

    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("session".into(), input.session.to_string());
    vars.insert("iteration".into(), input.iteration.to_string());
    vars.insert("spec".into(), spec);
    vars.insert("tasks".into(), render_tasks(&state));
    vars.insert("notes".into(), render_notes(&state));
    vars.insert("inbox".into(), render_inbox(&state));
    vars.insert("history".into(), render_history(&state, now));
    vars.insert("extra".into(), input.extra.unwrap_or("").to_string());

    Ok(apply_template(&template, &vars))
}

// ── Fragments ────────────────────────────────────────────────────────────────

/// Tasks grouped In progress / Remaining / Blocked / Completed, in that
/// order.  Empty groups are omitted; no tasks at all renders empty.
pub fn render_tasks(state: &State) -> String {
    let groups = [
        ("In progress", TaskStatus::InProgress),
        ("Remaining", TaskStatus::Remaining),
        ("Blocked", TaskStatus::Blocked),
        ("Completed", TaskStatus::Completed),
    ];

    let ordered = state.tasks_ordered();
    let mut sections = Vec::new();
    for (label, status) in groups {
        let lines: Vec<String> = ordered
            .iter()
            .filter(|t| t.status == status)
            .map(|t| {
                let mut line = format!("- [{}] {} (iter {})", t.id, t.content, t.iteration);
                if let Some(dep) = &t.depends_on {
                    line.push_str(&format!(" [depends on {dep}]"));
                }
                line
            })
            .collect();
        if !lines.is_empty() {
            sections.push(format!("{label}:\n{}", lines.join("\n")));
        }
    }
    sections.join("\n\n")
}

/// Notes grouped by type in the order learning, decision, tip, stuck;
/// each line `[#iteration] content`.
pub fn render_notes(state: &State) -> String {
    let groups = [
        ("Learnings", iteratr_store::NoteType::Learning),
        ("Decisions", iteratr_store::NoteType::Decision),
        ("Tips", iteratr_store::NoteType::Tip),
        ("Stuck", iteratr_store::NoteType::Stuck),
    ];

    let mut sections = Vec::new();
    for (label, note_type) in groups {
        let lines: Vec<String> = state
            .notes
            .iter()
            .filter(|n| n.note_type == note_type)
            .map(|n| format!("- [#{}] {}", n.iteration, n.content))
            .collect();
        if !lines.is_empty() {
            sections.push(format!("{label}:\n{}", lines.join("\n")));
        }
    }
    sections.join("\n\n")
}

/// Unread inbox messages only.  Distinguishes "nothing unread" from
/// "no messages at all".
pub fn render_inbox(state: &State) -> String {
    if state.inbox.is_empty() {
        return "No messages".to_string();
    }
    let unread = state.unread_inbox();
    if unread.is_empty() {
        return "No unread messages".to_string();
    }
    unread
        .iter()
        .map(|m| format!("- {}", m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The last five summarized iterations, oldest first, each
/// `- #N (<time-ago>): <summary>`.
pub fn render_history(state: &State, now: DateTime<Utc>) -> String {
    let summarized: Vec<&iteratr_store::Iteration> = state
        .iterations
        .iter()
        .filter(|i| i.summary.is_some())
        .collect();

    let start = summarized.len().saturating_sub(HISTORY_LIMIT);
    summarized[start..]
        .iter()
        .map(|i| {
            let when = i.ended_at.unwrap_or(i.started_at);
            let summary = i.summary.as_deref().unwrap_or("");
            format!("- #{} ({}): {}", i.number, time_ago(when, now), summary)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Coarse human-readable age: "just now", "5min ago", "3hr ago",
/// "1 day ago", "4 days ago".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let minutes = delta.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}min ago");
    }
    let hours = delta.num_hours();
    if hours < 24 {
        return format!("{hours}hr ago");
    }
    let days = delta.num_days();
    if days == 1 {
        "1 day ago".to_string()
    } else {
        format!("{days} days ago")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
