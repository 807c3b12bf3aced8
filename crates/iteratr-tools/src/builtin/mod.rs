// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod iteration_summary;
pub mod note_add;
pub mod note_list;
pub mod session_complete;
pub mod task_add;
pub mod task_list;
pub mod task_next;
pub mod task_update;

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use iteratr_store::{EventLog, Store};

    /// A store over a throwaway log directory, for tool tests.
    pub fn test_store() -> (Arc<Store>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(EventLog::open(dir.path()).unwrap());
        (Arc::new(Store::new(log)), dir)
    }

    pub fn call(name: &str, args: serde_json::Value) -> crate::ToolCall {
        crate::ToolCall {
            id: "t1".into(),
            name: name.into(),
            args,
        }
    }
}
