//! Network and transport error types.

use std::fmt;

/// Network-level error variants.
///
/// These cover connection establishment, request transmission, and
/// non-success HTTP statuses. Cancellation lives here too because it is
/// delivered through the same transport path, but it is explicitly a
/// non-error outcome for the orchestrator (see [`NetworkError::Cancelled`]).
#[derive(Debug, Clone)]
pub enum NetworkError {
    /// Could not connect to the gateway.
    ConnectionFailed {
        url: String,
        message: String,
    },

    /// The transport timed out waiting for data.
    Timeout {
        operation: String,
    },

    /// The gateway returned a non-success status.
    ///
    /// `message` is the structured error field from the response body when
    /// one was present, otherwise the status text.
    HttpStatus {
        status: u16,
        message: String,
    },

    /// The request was cancelled by the caller.
    ///
    /// This variant must never be surfaced to the user as a failure; the
    /// session orchestrator swallows it and returns to idle.
    Cancelled,

    /// Anything else the transport reported.
    Other {
        message: String,
    },
}

impl NetworkError {
    /// Whether retrying the same exchange is likely to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::ConnectionFailed { .. } | NetworkError::Timeout { .. } => true,
            NetworkError::HttpStatus { status, .. } => *status >= 500,
            NetworkError::Cancelled | NetworkError::Other { .. } => false,
        }
    }

    /// User-facing message for display in the frontend.
    pub fn user_message(&self) -> String {
        match self {
            NetworkError::ConnectionFailed { url, .. } => {
                format!("Could not reach the gateway at {}.", url)
            }
            NetworkError::Timeout { .. } => {
                "The gateway took too long to respond. Please try again.".to_string()
            }
            NetworkError::HttpStatus { message, .. } => message.clone(),
            NetworkError::Cancelled => "Request cancelled.".to_string(),
            NetworkError::Other { message } => message.clone(),
        }
    }

    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed { .. } => "E_NET_CONN",
            NetworkError::Timeout { .. } => "E_NET_TIMEOUT",
            NetworkError::HttpStatus { .. } => "E_NET_STATUS",
            NetworkError::Cancelled => "E_NET_CANCELLED",
            NetworkError::Other { .. } => "E_NET_OTHER",
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ConnectionFailed { url, message } => {
                write!(f, "Connection to {} failed: {}", url, message)
            }
            NetworkError::Timeout { operation } => {
                write!(f, "Timeout during {}", operation)
            }
            NetworkError::HttpStatus { status, message } => {
                write!(f, "Gateway error ({}): {}", status, message)
            }
            NetworkError::Cancelled => write!(f, "Request cancelled"),
            NetworkError::Other { message } => write!(f, "Network error: {}", message),
        }
    }
}

impl std::error::Error for NetworkError {}
