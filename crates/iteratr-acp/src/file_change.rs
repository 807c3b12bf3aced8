// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Derivation of [`FileChange`] records from the tool-call stream.
//!
//! A change is emitted only for `completed` tool calls of kind `edit`.
//! Sources, in preference order: the call's diff blocks (one change per
//! block, line counts from a path-matching [`FileDiff`] when present), a
//! lone [`FileDiff`] used verbatim, or the `filePath` argument with zeroed
//! counts.

use std::path::PathBuf;

use crate::events::{FileChange, ToolCallStatus, ToolCallUpdate};

/// Derive the file changes implied by one tool-call update.
pub fn derive_file_changes(update: &ToolCallUpdate) -> Vec<FileChange> {
    if update.status != ToolCallStatus::Completed || update.kind.as_deref() != Some("edit") {
        return Vec::new();
    }

    if !update.diffs.is_empty() {
        return update
            .diffs
            .iter()
            .map(|block| {
                let counts = update
                    .file_diff
                    .as_ref()
                    .filter(|fd| fd.path == block.path)
                    .map(|fd| (fd.additions, fd.deletions))
                    .unwrap_or((0, 0));
                FileChange {
                    abs_path: PathBuf::from(&block.path),
                    is_new: block.old_text.is_empty(),
                    additions: counts.0,
                    deletions: counts.1,
                }
            })
            .collect();
    }

    if let Some(fd) = &update.file_diff {
        return vec![FileChange {
            abs_path: PathBuf::from(&fd.path),
            is_new: false,
            additions: fd.additions,
            deletions: fd.deletions,
        }];
    }

    if let Some(path) = update
        .raw_input
        .as_ref()
        .and_then(|v| v.get("filePath"))
        .and_then(|v| v.as_str())
    {
        return vec![FileChange {
            abs_path: PathBuf::from(path),
            is_new: false,
            additions: 0,
            deletions: 0,
        }];
    }

    Vec::new()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
