//! Correlation identifiers linking an exchange to server-side records.
//!
//! The gateway assigns thread/message/trace/run identifiers out-of-band in
//! response headers, and occasionally in-band inside stream frames. Fields
//! update monotonically: once set, a value is only replaced by a newer
//! non-empty value from the same exchange and is never cleared mid-stream.

use crate::draft::CompletionChunk;
use crate::traits::{header_get, Headers};

/// Response header carrying the thread identifier.
pub const THREAD_ID_HEADER: &str = "X-Thread-Id";
/// Response header carrying the message identifier.
pub const MESSAGE_ID_HEADER: &str = "X-Message-Id";
/// Response header carrying the trace identifier.
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";
/// Response header carrying the run identifier.
pub const RUN_ID_HEADER: &str = "X-Run-Id";

/// Latest known correlation identifiers for one exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationState {
    thread_id: Option<String>,
    message_id: Option<String>,
    trace_id: Option<String>,
    run_id: Option<String>,
}

impl CorrelationState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a state with a known thread id (continuing a conversation).
    pub fn with_thread_id(thread_id: impl Into<String>) -> Self {
        let mut state = Self::default();
        state.thread_id = Some(thread_id.into());
        state
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Absorb correlation headers from a resolved response.
    ///
    /// Header names match case-insensitively. Missing headers are tolerated:
    /// downstream features that need them simply do not trigger.
    pub fn absorb_headers(&mut self, headers: &Headers) {
        Self::update(&mut self.thread_id, header_get(headers, THREAD_ID_HEADER));
        Self::update(&mut self.message_id, header_get(headers, MESSAGE_ID_HEADER));
        Self::update(&mut self.trace_id, header_get(headers, TRACE_ID_HEADER));
        Self::update(&mut self.run_id, header_get(headers, RUN_ID_HEADER));

        tracing::debug!(
            thread_id = ?self.thread_id,
            message_id = ?self.message_id,
            trace_id = ?self.trace_id,
            run_id = ?self.run_id,
            "absorbed correlation headers"
        );
    }

    /// Absorb in-band identifiers carried by a stream frame.
    pub fn absorb_chunk(&mut self, chunk: &CompletionChunk) {
        Self::update(&mut self.thread_id, chunk.thread_id.as_deref());
        Self::update(&mut self.run_id, chunk.run_id.as_deref());
    }

    /// Monotonic overwrite: only a non-empty incoming value replaces the
    /// current one.
    fn update(slot: &mut Option<String>, incoming: Option<&str>) {
        if let Some(value) = incoming {
            if !value.is_empty() {
                *slot = Some(value.to_string());
            }
        }
    }
}
