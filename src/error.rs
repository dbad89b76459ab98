// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Scribe
//!
//! This module defines all error types used throughout the crate.
//!
//! The error taxonomy follows four tiers:
//! - hard errors abort the current request (`ToolResolution`, `Media`,
//!   `ToolResponse`, ...)
//! - per-call tool failures are caught at the dispatch boundary and turned
//!   into Tool-role messages, so they never reach the caller as errors
//! - malformed directive blocks are self-correcting inside the builder and
//!   produce no error at all
//! - `Cancelled` is not a failure; callers must not render it as one

use thiserror::Error;

/// Main error type for Scribe operations
#[derive(Error, Debug)]
pub enum ScribeError {
    /// Buffer state errors (invalid positions, out-of-range lines)
    #[error("Buffer error: {0}")]
    Buffer(String),

    /// Tool reference could not be resolved (unknown group, empty prefix
    /// match, unreadable document, malformed tool list)
    #[error("Tool resolution failed: {0}")]
    ToolResolution(String),

    /// A tool's own execution failed
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// A document tool responded with something other than the required
    /// `{"final_answer": string}` shape
    #[error("Invalid tool response from {source_document}: {raw_body}")]
    ToolResponse {
        source_document: String,
        raw_body: String,
    },

    /// Document-tool recursion exceeded the depth bound
    #[error("Tool recursion too deep: {0} levels")]
    ToolRecursion(usize),

    /// Unsupported media type in a multimodal message
    #[error("Unsupported media type: {0}")]
    Media(String),

    /// Provider-side errors (stream failures, bad completions)
    #[error("Provider error: {0}")]
    Provider(String),

    /// The operation was cancelled. Not a failure; halts work silently.
    #[error("Cancelled")]
    Cancelled,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ScribeError {
    /// Whether this error is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScribeError::Cancelled)
    }
}

/// Result type alias for Scribe operations
pub type Result<T> = std::result::Result<T, ScribeError>;
