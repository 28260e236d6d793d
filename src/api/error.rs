//! Error types for API operations

use thiserror::Error;

/// Errors raised while talking to the image service
#[derive(Debug, Error)]
pub enum ApiError {
    /// A client-side precondition failed; nothing was sent
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The service answered with a non-success status
    #[error("{path} returned status {status}")]
    Transport {
        status: u16,
        path: String,
        body: String,
    },

    /// The request never produced a response (DNS, TLS, connect, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// A success response whose body was empty or could not be decoded
    #[error("unexpected response from {path}: {message}")]
    Protocol { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn protocol(path: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Protocol {
            path: path.into(),
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Field name of a failed precondition
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ApiError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Transport { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
