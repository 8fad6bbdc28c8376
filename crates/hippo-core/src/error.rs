// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the hippo memory engine.

use thiserror::Error;

/// The primary error type used across hippo adapter traits and brain operations.
#[derive(Debug, Error)]
pub enum HippoError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A looked-up item does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Caller supplied malformed input (e.g. metadata without a `type`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The component is closed or otherwise not accepting work.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// LLM or remote embedder failures (network, HTTP status, bad payload).
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database open, query failure, I/O).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Persisted data that cannot be decoded.
    #[error("corrupt record: {0}")]
    Corruption(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Operation was cancelled by its caller or by shutdown.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HippoError {
    /// Builds an [`HippoError::Upstream`] without an underlying source.
    pub fn upstream(message: impl Into<String>) -> Self {
        HippoError::Upstream {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true for errors that come from an external service.
    pub fn is_upstream(&self) -> bool {
        matches!(self, HippoError::Upstream { .. } | HippoError::Timeout { .. })
    }
}

impl From<std::io::Error> for HippoError {
    fn from(e: std::io::Error) -> Self {
        HippoError::Storage {
            source: Box::new(e),
        }
    }
}
