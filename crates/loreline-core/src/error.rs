// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Loreline retrieval subsystem.

use thiserror::Error;

/// The primary error type used across all Loreline crates.
#[derive(Debug, Error)]
pub enum LorelineError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, constraint violation).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Embedding backend errors (model call failure, dimension mismatch).
    #[error("embedding error: {message}")]
    Embedding {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed or undecodable job payload. Non-retryable in spirit, but the
    /// queue has no poison classification, so it consumes retries like any
    /// other failure and dead-letters for manual triage.
    #[error("payload error: {0}")]
    Payload(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
