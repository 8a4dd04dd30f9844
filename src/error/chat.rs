//! Unified error type for the chat client.

use std::fmt;

use super::network::NetworkError;
use super::stream::StreamError;
use crate::traits::HttpError;

/// Unified error type consolidating every failure the client can produce.
#[derive(Debug, Clone)]
pub enum ChatError {
    /// Transport and HTTP-level failures.
    Network(NetworkError),
    /// Event-stream failures.
    Stream(StreamError),
}

impl ChatError {
    /// Whether this error represents caller-initiated cancellation.
    ///
    /// Cancellation is a distinct, non-error outcome: the orchestrator checks
    /// this before deciding whether an exchange moved to `Failed`.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ChatError::Network(NetworkError::Cancelled))
    }

    /// Whether retrying the exchange is likely to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Network(e) => e.is_retryable(),
            ChatError::Stream(e) => e.is_retryable(),
        }
    }

    /// User-facing message for display in the frontend.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Network(e) => e.user_message(),
            ChatError::Stream(e) => e.user_message(),
        }
    }

    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ChatError::Network(e) => e.error_code(),
            ChatError::Stream(e) => e.error_code(),
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Network(e) => write!(f, "{}", e),
            ChatError::Stream(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChatError::Network(e) => Some(e),
            ChatError::Stream(e) => Some(e),
        }
    }
}

impl From<NetworkError> for ChatError {
    fn from(e: NetworkError) -> Self {
        ChatError::Network(e)
    }
}

impl From<StreamError> for ChatError {
    fn from(e: StreamError) -> Self {
        ChatError::Stream(e)
    }
}

impl From<HttpError> for ChatError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::ConnectionFailed { url, message } => {
                ChatError::Network(NetworkError::ConnectionFailed { url, message })
            }
            HttpError::Timeout { operation } => {
                ChatError::Network(NetworkError::Timeout { operation })
            }
            HttpError::Cancelled => ChatError::Network(NetworkError::Cancelled),
            HttpError::Other { message } => ChatError::Network(NetworkError::Other { message }),
        }
    }
}
