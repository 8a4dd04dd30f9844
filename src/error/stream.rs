//! Streaming-related error types.
//!
//! Errors that can occur while decoding the event stream or folding decoded
//! payloads into the draft. Note that per the decoding contract most stream
//! irregularities are tolerated silently (malformed payloads are dropped,
//! non-framing lines are skipped); only conditions that end the exchange
//! become `StreamError`s.

use std::fmt;

/// Stream-specific error variants.
#[derive(Debug, Clone)]
pub enum StreamError {
    /// The byte stream ended abnormally mid-exchange.
    ConnectionLost {
        message: String,
    },

    /// The gateway reported an error inside the event stream.
    InBandError {
        message: String,
    },

    /// Generic stream error.
    Other {
        message: String,
    },
}

impl StreamError {
    /// Whether the exchange can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StreamError::ConnectionLost { .. })
    }

    /// User-facing message for display in the frontend.
    pub fn user_message(&self) -> String {
        match self {
            StreamError::ConnectionLost { .. } => {
                "Connection to the gateway was lost mid-response.".to_string()
            }
            StreamError::InBandError { message } => message.clone(),
            StreamError::Other { message } => format!("Stream error: {}", message),
        }
    }

    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::ConnectionLost { .. } => "E_STREAM_CONN",
            StreamError::InBandError { .. } => "E_STREAM_INBAND",
            StreamError::Other { .. } => "E_STREAM_OTHER",
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::ConnectionLost { message } => {
                write!(f, "Stream connection lost: {}", message)
            }
            StreamError::InBandError { message } => {
                write!(f, "Gateway stream error: {}", message)
            }
            StreamError::Other { message } => write!(f, "Stream error: {}", message),
        }
    }
}

impl std::error::Error for StreamError {}
