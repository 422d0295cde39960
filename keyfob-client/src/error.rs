//! Error types for the device-flow client.

use thiserror::Error;

/// Errors that can occur while obtaining a token.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    /// A required field or callback was never configured. Fatal, not retried.
    #[error("configuration error: {0}")]
    Config(&'static str),

    /// The HTTP request itself failed (connection, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a structured protocol error.
    #[error("{error}: {description} (status {status})")]
    Response {
        error: String,
        description: String,
        status: u16,
    },

    /// The server returned something that was not a decodable response.
    #[error("unexpected response (status {status}): {body}")]
    Transport { status: u16, body: String },

    /// The device code expired before the user authorized it.
    #[error("device authorization timed out")]
    Timeout,

    /// The user denied the authorization request.
    #[error("authorization denied")]
    Denied,

    /// The token endpoint reported the device code as expired.
    #[error("device code expired")]
    Expired,

    /// The flow was cancelled from outside.
    #[error("authorization cancelled")]
    Cancelled,
}

impl FlowError {
    /// Whether this outcome means the server or user refused authorization,
    /// as opposed to a transport or timing failure.
    #[must_use]
    pub fn is_refusal(&self) -> bool {
        matches!(self, FlowError::Denied | FlowError::Expired)
    }
}
