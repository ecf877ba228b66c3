//! Error types for driver operations.

use thiserror::Error;

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while connecting to or querying a cluster.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (bad option value, malformed URL, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single connection attempt failed. Retried internally against the
    /// next candidate host, up to the configured bound.
    #[error("Connection attempt failed: {0}")]
    Connect(String),

    /// Authentication handshake rejected by the server. Ends the current
    /// candidate's attempt; the next candidate is tried.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// All candidate hosts (primary and backup) are exhausted, or a severe
    /// query-time fault closed the session. The caller must reconnect.
    #[error("Connection lost: {0}")]
    NonTransientConnection(String),

    /// Malformed or illegal query text. The session remains usable.
    #[error("CQL syntax error: {0}")]
    Syntax(String),

    /// Not enough replicas were available for the requested consistency
    /// level. The session is closed as a side effect.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// The operation exceeded its time budget. Transient; the session
    /// remains open.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Client and server disagree on the schema version. Recoverable.
    #[error("Schema disagreement: {0}")]
    SchemaDisagreement(String),

    /// Transport-level fault (broken socket, unexpected RPC failure).
    /// The session is closed as a side effect.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed or truncated wire frame.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A negative timeout was passed to a liveness check.
    #[error("Bad timeout value: {0}")]
    BadTimeout(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a per-attempt connection error.
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Check if the error is transient and safe to retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_))
    }

    /// Check if the error forces the session closed, so callers must
    /// re-establish rather than retry against a poisoned socket.
    #[must_use]
    pub fn closes_session(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Transport(_) | Self::Protocol(_)
        )
    }

    /// Check if the error counts toward the session failure counter.
    ///
    /// Well-formed server-side rejections (syntax, authentication) do not;
    /// transport-level faults do.
    #[must_use]
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            Self::Connect(_)
                | Self::Unavailable(_)
                | Self::Timeout(_)
                | Self::SchemaDisagreement(_)
                | Self::Transport(_)
                | Self::Protocol(_)
        )
    }

    /// Check if the error is recoverable on the same session.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::SchemaDisagreement(_))
    }
}
