// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Kestrel assistant runtime.

use thiserror::Error;

/// The primary error type used across all Kestrel adapter traits and core operations.
#[derive(Debug, Error)]
pub enum KestrelError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage errors (session files, cron store, memory files).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (connection failure, message format, delivery).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors. `status` carries the HTTP status when one was received.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A tool invocation failed.
    #[error("tool error: {message}")]
    Tool {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The approval round-trip could not be completed.
    #[error("approval error: {0}")]
    Approval(String),

    /// Scheduler errors (bad schedule, unknown job).
    #[error("cron error: {0}")]
    Cron(String),

    /// Requested adapter was not found in the registry.
    #[error("adapter not found: {adapter_type}/{name}")]
    AdapterNotFound { adapter_type: String, name: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KestrelError {
    /// Wraps any error as a storage error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        KestrelError::Storage {
            source: Box::new(err),
        }
    }

    /// Returns true when retrying the same operation may succeed.
    ///
    /// Timeouts, rate limits (429), server errors (5xx), and transport
    /// failures that never produced a status are transient. Everything
    /// else (auth, bad request, config) is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            KestrelError::Timeout { .. } => true,
            KestrelError::Provider { status, source, .. } => match status {
                Some(code) => *code == 429 || (500..600).contains(code),
                None => source.is_some(),
            },
            _ => false,
        }
    }
}

impl From<std::io::Error> for KestrelError {
    fn from(err: std::io::Error) -> Self {
        KestrelError::storage(err)
    }
}

impl From<serde_json::Error> for KestrelError {
    fn from(err: serde_json::Error) -> Self {
        KestrelError::storage(err)
    }
}
