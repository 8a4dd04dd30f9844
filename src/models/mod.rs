//! Data models shared across the crate.

mod message;
mod request;

pub use message::{ChatMessage, Role};
pub use request::CompletionRequest;
