//! Core error types for the terminal bridge

use std::fmt;
use std::path::PathBuf;

use tb_protocol::{ErrorKind, ErrorPayload, ProtocolError};
use thiserror::Error;

/// Top-level error type for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Capability error
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The channel closed before the operation could complete
    #[error("Channel closed")]
    ChannelClosed,

    /// The supervisor gave up restarting the client
    #[error("Restart limit exceeded after {attempts} consecutive failures")]
    RestartLimitExceeded { attempts: u32 },

    /// A background task panicked or was aborted
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

/// Transport-level errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Could not open the channel
    #[error("Failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// Channel failed after it was opened
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Writing a frame failed
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Errors raised while binding a capability object to the bridge
#[derive(Error, Debug)]
pub enum CapabilityError {
    /// Members required by configuration are not exposed by the capability
    #[error("Capability '{capability}' is missing required members: {}", .missing.join(", "))]
    MissingMembers {
        capability: String,
        missing: Vec<String>,
    },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Failure of a capability member invocation.
///
/// Converted to `{"error": [kind, message]}` before it is sent to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl InvocationError {
    /// Create a new invocation error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error for arguments the member cannot accept
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArguments, message)
    }

    /// Convert into the wire payload
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.kind.clone(), self.message.clone())
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for InvocationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_members_message_lists_names() {
        let err = CapabilityError::MissingMembers {
            capability: "terminal".to_string(),
            missing: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Capability 'terminal' is missing required members: a, b"
        );
    }

    #[test]
    fn test_invocation_error_payload() {
        let err = InvocationError::new(ErrorKind::Canceled, "stopped");
        let payload = err.to_payload();
        assert_eq!(payload.kind(), &ErrorKind::Canceled);
        assert_eq!(payload.message(), "stopped");
        assert_eq!(err.to_string(), "canceled: stopped");
    }
}
