//! Error types for the realtime session engine.
//!
//! Only connection-lifecycle and caller-misuse failures surface as `Err`
//! values. Errors that occur mid-session (transport drops, malformed inbound
//! messages, tool-handler failures) are recovered locally and reflected
//! through the event log and connection status instead.

use thiserror::Error;

/// Errors that can occur during realtime session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `connect` was called while a session is already live
    #[error("already connected")]
    AlreadyConnected,

    /// An operation that requires a live connection was attempted without one
    #[error("not connected")]
    NotConnected,

    /// The credential environment variable is absent or empty
    #[error("missing credentials: environment variable {0} is not set")]
    MissingCredentials(String),

    /// The transport handshake failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A transport send or receive failed mid-session
    #[error("transport error: {0}")]
    Transport(String),

    /// A caller-supplied payload was malformed
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// JSON serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A tool with the same name is already registered
    #[error("duplicate tool: {0}")]
    DuplicateTool(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("connection failed"));

        let err = SessionError::NotConnected;
        assert_eq!(err.to_string(), "not connected");

        let err = SessionError::MissingCredentials("REALTIME_API_KEY".to_string());
        assert!(err.to_string().contains("REALTIME_API_KEY"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: SessionError = parse_err.into();
        assert!(matches!(err, SessionError::Serialization(_)));
    }
}
