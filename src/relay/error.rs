//! Error types for the relay.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the relay, each mapped to one HTTP response shape.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No prompt, or a blank one. The upstream is never contacted.
    #[error("Prompt is required")]
    MissingPrompt,

    /// The provider rejected or failed the request.
    #[error("{message}")]
    UpstreamFailure {
        /// Status to report to the caller.
        status: StatusCode,
        /// Caller-visible message.
        message: String,
    },

    /// Anything unexpected inside the relay.
    #[error("{0}")]
    InternalFault(String),
}

impl RelayError {
    /// Failure reported by the provider with a non-success status.
    #[must_use]
    pub fn upstream_status(status: StatusCode, body: &str) -> Self {
        Self::UpstreamFailure {
            status,
            message: format!("API request failed: {body}"),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingPrompt => StatusCode::BAD_REQUEST,
            Self::UpstreamFailure { status, .. } => *status,
            Self::InternalFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        let status = if err.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self::UpstreamFailure {
            status,
            message: format!("API request failed: {err}"),
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalFault(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
