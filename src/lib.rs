//! chatstream - a streaming chat-completion client for an LLM gateway.
//!
//! The crate drives one conversation with a gateway speaking the familiar
//! chat-completions shape: submit a user message, stream the assistant's
//! reply as newline-delimited `data:` frames, fold the deltas into a draft
//! message, and track the correlation identifiers the gateway hands back in
//! response headers.
//!
//! The pieces compose bottom-up:
//! - [`sse::FrameDecoder`] turns arbitrarily-chunked bytes into frame
//!   payloads.
//! - [`draft::AssistantDraft`] folds decoded payloads into the in-progress
//!   assistant message (content, tool-call fragments, usage).
//! - [`correlation::CorrelationState`] absorbs thread/message/trace/run ids
//!   monotonically.
//! - [`cancel`] provides per-exchange cooperative cancellation.
//! - [`session::Conversation`] orchestrates the whole exchange lifecycle and
//!   publishes [`events::ChatEvent`] notifications.
//!
//! Transport is abstracted behind [`traits::HttpClient`]; a reqwest-backed
//! production adapter and a scripted mock live in [`adapters`].

pub mod adapters;
pub mod cancel;
pub mod correlation;
pub mod draft;
pub mod error;
pub mod events;
pub mod gateway;
pub mod models;
pub mod session;
pub mod sse;
pub mod traits;

pub use cancel::{CancelToken, CancellationController};
pub use correlation::CorrelationState;
pub use draft::AssistantDraft;
pub use error::{ChatError, ChatResult};
pub use events::{ChatEvent, EventSink};
pub use gateway::{GatewayClient, GatewayConfig};
pub use models::{ChatMessage, CompletionRequest, Role};
pub use session::{CancelHandle, Conversation, ExchangeOutcome};
pub use sse::FrameDecoder;
