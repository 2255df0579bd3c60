// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Talkrelay message relay.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across adapter traits and the relay engine.
///
/// Variants follow the relay's failure taxonomy: what is retried, what is
/// skipped, and what is dropped is decided by matching on the variant, never
/// by inspecting message strings.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (missing credentials, malformed URLs, bad regexes).
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote backend answered with a non-200, non-4xx status.
    #[error("{endpoint}: status={status} description={description}")]
    Protocol {
        endpoint: String,
        status: u16,
        description: String,
    },

    /// Remote backend rejected the request itself (4xx).
    #[error("{endpoint}: request rejected, status={status} description={description}")]
    ClientRequest {
        endpoint: String,
        status: u16,
        description: String,
    },

    /// Connection refused/reset, DNS failure, request timeout, unreadable body.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single message could not be turned into deliverable content.
    #[error("content build error: {0}")]
    ContentBuild(String),

    /// Accumulated backoff exceeded the per-message ceiling.
    #[error("delivery timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// A room transport call failed.
    #[error("room transport error: {message}")]
    Room {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Whether the retry queue should attempt the same request again.
    ///
    /// Infrastructure failures (transport, 5xx, malformed responses) are
    /// retryable. A 4xx means the request itself is invalid.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Protocol { .. })
    }

    /// Shorthand for a transport error wrapping a lower-level cause.
    pub fn transport(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for a room transport error wrapping a lower-level cause.
    pub fn room(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Room {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
