//! Error handling for the chat client.
//!
//! Two domain-specific error enums plus a unified type:
//!
//! - [`NetworkError`] — transport, HTTP status, cancellation
//! - [`StreamError`] — event-stream failures
//! - [`ChatError`] — unified type with `From` conversions from both,
//!   carrying `user_message()` / `error_code()` / `is_retryable()`
//!
//! The client is deliberately tolerant: malformed stream payloads and missing
//! correlation headers are not errors at all (they are dropped or ignored at
//! the decode/accumulate layer), and cancellation converts into a silent
//! return to idle rather than a user-visible failure.

mod chat;
mod network;
mod stream;

pub use chat::ChatError;
pub use network::NetworkError;
pub use stream::StreamError;

/// Result alias used throughout the crate.
pub type ChatResult<T> = Result<T, ChatError>;
