//! Error types for the generation client.

use std::time::Duration;

use thiserror::Error;

use super::stages::StageError;

/// Errors that can end or prevent a generation attempt.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The prompt is blank; nothing was sent.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// Another attempt is in flight.
    #[error("a generation is already running")]
    AlreadyRunning,

    /// Network failure talking to the relay or provider.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The relay or provider reported an error.
    #[error("upstream failure ({status}): {message}")]
    Upstream {
        /// HTTP status, or 502 for in-stream errors.
        status: u16,
        /// Provider or relay message.
        message: String,
    },

    /// The attempt exceeded the configured timeout.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Stage bookkeeping rejected a transition.
    #[error("stage transition rejected: {0}")]
    Stage(#[from] StageError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether this counts as an upstream failure (network, provider, timeout).
    #[must_use]
    pub const fn is_upstream_failure(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Upstream { .. } | Self::Timeout(_))
    }
}


/// Convenience result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
