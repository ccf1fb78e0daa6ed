//! Error types for the model gateway.

use thiserror::Error;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Longest upstream body excerpt kept in a [`GatewayError::BadStatus`].
pub const BODY_EXCERPT_CHARS: usize = 200;

/// Failure of a call to the chat-completion endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("LLM read timeout: {0}")]
    Timeout(String),

    #[error("Error calling LLM: {0}")]
    Transport(String),

    #[error("LLM error: {status} {body}")]
    BadStatus { status: u16, body: String },

    #[error("Bad LLM response: {0}")]
    MalformedEnvelope(String),
}

/// Classification of a [`GatewayError`], used to pick the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    Timeout,
    Transport,
    BadStatus,
    MalformedEnvelope,
}

impl GatewayErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::BadStatus => "bad_status",
            Self::MalformedEnvelope => "malformed_envelope",
        }
    }
}

impl GatewayError {
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::Timeout(_) => GatewayErrorKind::Timeout,
            Self::Transport(_) => GatewayErrorKind::Transport,
            Self::BadStatus { .. } => GatewayErrorKind::BadStatus,
            Self::MalformedEnvelope(_) => GatewayErrorKind::MalformedEnvelope,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == GatewayErrorKind::Timeout
    }

    /// Non-success status, keeping only the head of the body.
    pub fn bad_status(status: u16, body: &str) -> Self {
        Self::BadStatus {
            status,
            body: body.chars().take(BODY_EXCERPT_CHARS).collect(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
