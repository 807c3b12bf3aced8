// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

/// Render a prompt template in a single left-to-right pass.
///
/// Every `{{name}}` token whose name has an entry in `vars` is replaced by
/// that value; tokens with no matching entry are copied through untouched,
/// so user templates may carry placeholders this crate does not know about.
/// Values are inserted literally — a brace pair inside a substituted value
/// is never expanded again.
pub fn apply_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            // Unterminated token: nothing left to substitute.
            break;
        };
        let name = &rest[open + 2..open + 2 + close];
        out.push_str(&rest[..open]);
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(name);
                out.push_str("}}");
            }
        }
        rest = &rest[open + 2 + close + 2..];
    }

    out.push_str(rest);
    out
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
