//! Actor Error Types
//!
//! Two layers of errors live here:
//! - [`ErrorValue`]: the serializable envelope that crosses a channel boundary
//!   whenever an actor constructor or method fails
//! - [`ActorError`]: the crate-level error returned by spawn and call operations
//!
//! Remote failures are never re-wrapped. Whatever [`ErrorValue`] the actor code
//! produced is what the caller receives inside [`ActorError::Thrown`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Default kind for errors raised by actor code
pub const KIND_ERROR: &str = "Error";

/// Kind used for argument decoding failures and missing methods
pub const KIND_TYPE_ERROR: &str = "TypeError";

/// Kind used when actor code panicked
pub const KIND_PANIC: &str = "Panic";

/// Serializable error envelope exchanged over actor channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorValue {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ErrorValue {
    /// Create an error of the default kind
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: KIND_ERROR.to_string(),
            message: message.into(),
            detail: None,
        }
    }

    /// Create a type error (bad arguments, missing method)
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(KIND_TYPE_ERROR)
    }

    /// Replace the kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Attach arbitrary structured detail
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Convert a caught panic payload into an error value
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "actor code panicked".to_string()
        };
        Self::new(message).with_kind(KIND_PANIC)
    }

    pub fn is_type_error(&self) -> bool {
        self.kind == KIND_TYPE_ERROR
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorValue {}

impl From<&str> for ErrorValue {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ErrorValue {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for ErrorValue {
    fn from(err: serde_json::Error) -> Self {
        Self::type_error(err.to_string())
    }
}

/// Main actor runtime error type
#[derive(Error, Debug)]
pub enum ActorError {
    /// Remote spawn attempted before any execution context exists
    #[error("Thread pool must be initialized with `create_local_thread_pool` first")]
    PoolNotInitialized,

    /// Value thrown by remote actor code, passed through unchanged
    #[error("{0}")]
    Thrown(ErrorValue),

    /// The other end of a channel is gone
    #[error("Channel disconnected: {endpoint}")]
    Disconnected { endpoint: String },

    /// Wire encoding/decoding errors
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Host failed to provide an execution context
    #[error("Execution context error: {message}")]
    Context {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Result type alias for actor operations
pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    /// Create a disconnected error for the named endpoint
    pub fn disconnected(endpoint: impl Into<String>) -> Self {
        Self::Disconnected {
            endpoint: endpoint.into(),
        }
    }

    /// Create an execution context error
    pub fn context(message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: None,
        }
    }

    /// Create an execution context error with source
    pub fn context_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Context {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// The value thrown by actor code, if this error carries one
    pub fn thrown(&self) -> Option<&ErrorValue> {
        match self {
            Self::Thrown(value) => Some(value),
            _ => None,
        }
    }

    /// Error category for structured logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::PoolNotInitialized => "configuration",
            Self::Thrown(_) => "thrown",
            Self::Disconnected { .. } => "disconnected",
            Self::Codec(_) => "codec",
            Self::Context { .. } => "context",
            Self::Configuration { .. } => "configuration",
        }
    }
}

impl From<ErrorValue> for ActorError {
    fn from(value: ErrorValue) -> Self {
        Self::Thrown(value)
    }
}
