//! Error types for policyrag
//!
//! Every failure a caller can observe is one of the variants below. The
//! `Display` output of each variant is meant for end users: server-provided
//! explanations are shown verbatim, everything else falls back to a fixed
//! per-operation message.

use thiserror::Error;

/// Main error type for the retrieval and summarization clients
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Caller input failed a precondition; no request was sent
    #[error("{0}")]
    Input(String),

    /// The request could not be completed (refused, DNS, reset)
    ///
    /// `detail` carries the underlying library error for logs only.
    #[error("{message}")]
    Transport { message: String, detail: String },

    /// A response arrived with a non-success status
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Malformed NDJSON or a stream that ended without `done: true`
    ///
    /// The payload is parser detail for logs only.
    #[error("The summary stream was malformed")]
    Protocol(String),

    /// The caller cancelled an in-flight summary stream
    #[error("Summary stream cancelled")]
    Cancelled,

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Discriminant of [`ClientError`], handy for matching without payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Transport,
    Server,
    Protocol,
    Cancelled,
    Config,
}

impl ClientError {
    /// Build a transport error with a fixed user-facing message
    pub fn transport(message: impl Into<String>, detail: impl ToString) -> Self {
        ClientError::Transport {
            message: message.into(),
            detail: detail.to_string(),
        }
    }

    /// Replace the user-facing message of a transport error
    ///
    /// Other variants pass through untouched.
    pub fn for_operation(self, message: &str) -> Self {
        match self {
            ClientError::Transport { detail, .. } => ClientError::Transport {
                message: message.to_string(),
                detail,
            },
            other => other,
        }
    }

    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Input(_) => ErrorKind::Input,
            ClientError::Transport { .. } => ErrorKind::Transport,
            ClientError::Server { .. } => ErrorKind::Server,
            ClientError::Protocol(_) => ErrorKind::Protocol,
            ClientError::Cancelled => ErrorKind::Cancelled,
            ClientError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
