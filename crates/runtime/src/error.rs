//! Error types for the out-of-process host runtime.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the out-of-process host runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// A locally validated argument was invalid (e.g. empty executable path).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The worker executable path does not resolve to an existing file.
    #[error("Worker executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    /// Failed to spawn the worker process.
    #[error("Failed to launch worker process: {0}")]
    LaunchFailed(String),

    /// The RPC session is closed: the worker exited or the host was disposed.
    #[error("Session closed: worker process exited or host was disposed")]
    SessionClosed,

    /// The remote side violated the message contract.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Transport-level failure (framing or stream error).
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Worker-reported error for a specific call.
    #[error("{name}: {message}")]
    Remote {
        /// Error type name reported by the worker
        name: String,
        /// Human-readable error message
        message: String,
        /// Remote stack trace, if available
        stack: Option<String>,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if the session is no longer usable for outbound calls.
    pub fn is_session_closed(&self) -> bool {
        matches!(self, Error::SessionClosed)
    }

    /// Returns the error name if this is a worker-reported error.
    pub fn error_name(&self) -> Option<&str> {
        match self {
            Error::Remote { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<oophost_protocol::DecodeError> for Error {
    fn from(err: oophost_protocol::DecodeError) -> Self {
        Error::ProtocolViolation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_surface_as_protocol_violations() {
        let err = Error::from(oophost_protocol::DecodeError::UnknownMethod(
            "NotifyNewFangledThing".to_string(),
        ));
        assert!(matches!(err, Error::ProtocolViolation(_)));
        assert!(!err.is_session_closed());
        assert_eq!(err.error_name(), None);
    }
}
