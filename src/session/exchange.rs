//! Per-exchange state.
//!
//! One [`ExchangeSession`] exists per submitted message and lives for the
//! duration of that round trip. Everything scoped to the exchange hangs off
//! it: the cancellation token, the draft being accumulated, the correlation
//! snapshot, and the one-shot first-delta flag.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::correlation::CorrelationState;
use crate::draft::{AssistantDraft, UsageRecord};
use crate::error::ChatError;

/// How an exchange ended.
///
/// Cancellation is its own variant rather than an error: a user stopping a
/// response is a normal outcome and must never surface through error paths.
#[derive(Debug)]
pub enum ExchangeOutcome {
    /// The stream ran to completion and the draft was finalized.
    Completed { usage: Option<UsageRecord> },
    /// The exchange was cancelled; whatever was accumulated is kept.
    Cancelled,
    /// The exchange failed before or during streaming.
    Failed { error: ChatError },
}

impl ExchangeOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExchangeOutcome::Completed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExchangeOutcome::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ExchangeOutcome::Failed { .. })
    }
}

/// State owned by one in-flight exchange.
#[derive(Debug)]
pub struct ExchangeSession {
    id: Uuid,
    token: CancelToken,
    draft: AssistantDraft,
    correlation: CorrelationState,
    first_delta_emitted: bool,
    started_at: DateTime<Utc>,
}

impl ExchangeSession {
    /// Start a session for a new exchange.
    ///
    /// `correlation` seeds the session with the conversation's identifiers
    /// (most importantly the thread id of a continuing conversation); the
    /// session then absorbs whatever the response reveals on top.
    pub fn new(token: CancelToken, correlation: CorrelationState) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            draft: AssistantDraft::new(),
            correlation,
            first_delta_emitted: false,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Milliseconds since submission.
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn draft(&self) -> &AssistantDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut AssistantDraft {
        &mut self.draft
    }

    pub fn correlation(&self) -> &CorrelationState {
        &self.correlation
    }

    pub fn correlation_mut(&mut self) -> &mut CorrelationState {
        &mut self.correlation
    }

    /// Consume the one-shot first-delta flag.
    ///
    /// Returns true exactly once per exchange, on the first call. Observers
    /// use the flag for effects that must fire once per response (the UI's
    /// initial scroll-to-bottom).
    pub fn mark_first_delta(&mut self) -> bool {
        !std::mem::replace(&mut self.first_delta_emitted, true)
    }

    /// Render the draft for the assistant message slot.
    ///
    /// Plain content stays plain text; once tool calls exist the slot holds
    /// the structured view serialized to JSON.
    pub fn display_text(&self) -> String {
        match self.draft.display_value() {
            serde_json::Value::String(text) => text,
            structured => structured.to_string(),
        }
    }
}
