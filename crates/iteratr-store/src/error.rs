// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Error taxonomy for the store and event log.
///
/// `Validation` and `NotFound` are returned to the immediate caller and never
/// retried.  `Transient` errors are retried under [`crate::RetryPolicy`];
/// `Permanent` errors abort the retry loop immediately.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient store error: {0}")]
    Transient(String),

    #[error("permanent store error: {0}")]
    Permanent(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Whether the retry policy should attempt the operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            // Unrecoverable filesystem states: retrying cannot help.
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                StoreError::Permanent(e.to_string())
            }
            _ => StoreError::Transient(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Permanent(format!("event serialization: {e}"))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable() {
        assert!(StoreError::Transient("disk hiccup".into()).is_transient());
    }

    #[test]
    fn validation_is_not_retryable() {
        assert!(!StoreError::validation("empty content").is_transient());
        assert!(!StoreError::NotFound("TAS-9".into()).is_transient());
        assert!(!StoreError::Cancelled.is_transient());
    }

    #[test]
    fn io_not_found_maps_to_permanent() {
        let e = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(StoreError::from(e), StoreError::Permanent(_)));
    }

    #[test]
    fn io_interrupted_maps_to_transient() {
        let e = std::io::Error::new(std::io::ErrorKind::Interrupted, "signal");
        assert!(StoreError::from(e).is_transient());
    }
}
