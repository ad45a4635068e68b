//! Error types and error handling for alarm-button.
//!
//! This module defines the crate error type, the status codes that travel
//! over the RPC wire, and the error body returned by the server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Status codes carried in RPC error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request is malformed or misses a required field.
    InvalidArgument,

    /// The server failed while handling a valid request.
    Internal,
}

impl ErrorCode {
    /// Returns the code as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidArgument => 400,
            ErrorCode::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process exit codes.
pub mod exit_code {
    /// Success
    pub const SUCCESS: u8 = 0;
    /// Any unrecoverable startup or runtime error
    pub const FAILURE: u8 = 1;
}

/// The main error type for alarm-button.
#[derive(Debug, Error)]
pub enum AlarmError {
    /// Configuration file is invalid or cannot be loaded.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No alarm state has been persisted yet.
    #[error("State not found: {}", .path.display())]
    StateNotFound { path: PathBuf },

    /// Alarm state could not be written or read back.
    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Request is missing a field or carries an invalid value.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Failed to reach the alarm server.
    #[error("Connection error: {target}")]
    Connection {
        target: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A call did not complete within its deadline.
    #[error("Timeout: {operation} (waited {millis}ms)")]
    Timeout { operation: String, millis: u64 },

    /// The server answered with an error status.
    #[error("Server error [{code}]: {message}")]
    Rpc { code: ErrorCode, message: String },

    /// The surrounding operation was cancelled before it completed.
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// The shutdown command is not available on this operating system.
    #[error("Unsupported operating system: {os}")]
    UnsupportedOs { os: String },

    /// Packaging or updating failed.
    #[error("Update error: {message}")]
    Update {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal failure.
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AlarmError {
    /// Returns the wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            AlarmError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            AlarmError::Rpc { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Returns the message sent to RPC callers. Argument and internal errors
    /// carry their bare message.
    pub fn public_message(&self) -> String {
        match self {
            AlarmError::InvalidArgument { message } | AlarmError::Internal { message } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }

    /// Returns true when the server was not reached or did not answer in time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AlarmError::Connection { .. } | AlarmError::Timeout { .. }
        )
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        exit_code::FAILURE
    }

    /// Creates a configuration error with a message.
    pub fn config(message: impl Into<String>) -> Self {
        AlarmError::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a configuration error with a message and source.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AlarmError::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a persistence error with a message and source.
    pub fn persistence_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AlarmError::Persistence {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a connection error with a source.
    pub fn connection_with_source(
        target: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AlarmError::Connection {
            target: target.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        AlarmError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an update error with a message.
    pub fn update(message: impl Into<String>) -> Self {
        AlarmError::Update {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an update error with a message and source.
    pub fn update_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AlarmError::Update {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        AlarmError::Internal {
            message: message.into(),
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        AlarmError::Cancelled {
            operation: operation.into(),
        }
    }
}

/// Error body returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status code.
    pub code: ErrorCode,

    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result type alias for alarm-button operations.
pub type Result<T> = std::result::Result<T, AlarmError>;
