//! Error types for Volley.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the whole Volley workspace.
///
/// The variants mirror the failure classes of an orchestration run: bad input,
/// broken engine contracts, engine/transport failures, and session misuse.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum VolleyError {
    /// Malformed or missing prompt input, or an argument outside its domain.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The engine returned a different number of outputs than requested.
    #[error("Shape mismatch: expected {expected} outputs, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// The engine could not be reached (connection refused, timeout, ...).
    #[error("Engine unavailable: {message}")]
    EngineUnavailable { message: String },

    /// The engine was reachable but rejected the request.
    #[error("Engine error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    EngineError {
        status: Option<u16>,
        message: String,
        retryable: bool,
        /// Server-requested delay before retrying, in milliseconds.
        #[serde(default)]
        retry_after_ms: Option<u64>,
    },

    /// The streaming connection dropped or stalled mid-response.
    #[error("Stream interrupted: {message}")]
    PartialStream { message: String },

    /// A response is already in flight for this conversation.
    #[error("A response is already in progress for this conversation")]
    SessionBusy,

    /// A session transition that is not defined for the current phase.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl VolleyError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates an EngineUnavailable error
    pub fn engine_unavailable(message: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            message: message.into(),
        }
    }

    /// Creates a non-retryable EngineError without an HTTP status
    pub fn engine(message: impl Into<String>) -> Self {
        Self::EngineError {
            status: None,
            message: message.into(),
            retryable: false,
            retry_after_ms: None,
        }
    }

    /// Creates a PartialStream error
    pub fn partial_stream(message: impl Into<String>) -> Self {
        Self::PartialStream {
            message: message.into(),
        }
    }

    /// Creates an InvalidState error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is an InvalidInput error
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Check if this is a ShapeMismatch error
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }

    /// Check if this error came from the engine or its transport.
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            Self::EngineUnavailable { .. } | Self::EngineError { .. } | Self::PartialStream { .. }
        )
    }

    /// Whether a retry of the same request may succeed.
    ///
    /// Transport failures are always retryable; engine rejections only when the
    /// engine said so (rate limiting, 5xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EngineUnavailable { .. } => true,
            Self::EngineError { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Server-requested retry delay, if any.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::EngineError {
                retry_after_ms: Some(ms),
                ..
            } => Some(std::time::Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for VolleyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for VolleyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for VolleyError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for VolleyError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, VolleyError>`.
pub type Result<T> = std::result::Result<T, VolleyError>;
