//! Delta accumulation: folding stream frames into the assistant draft.
//!
//! An [`AssistantDraft`] is the in-progress assistant message for one
//! exchange. It is owned by exactly one exchange and mutated only here, in
//! strict arrival order, so no locking is needed.
//!
//! Accumulation rules:
//! 1. A payload that fails to parse is dropped; the draft is unchanged.
//! 2. `usage` is recorded once per exchange - first occurrence wins, later
//!    usage events are ignored.
//! 3. Content deltas append verbatim in arrival order.
//! 4. Tool-call deltas are keyed by `index`: the fragment is created on
//!    first sight; `id` and `name` are set only while empty and only from
//!    non-empty values; `arguments` text always appends.

mod payloads;

use std::collections::BTreeMap;

pub use payloads::{
    ChunkChoice, ChunkDelta, CompletionChunk, CompletionResponse, FunctionDelta, ToolCallDelta,
    UsageRecord,
};

/// A partially assembled tool invocation.
///
/// `arguments_text` accumulates raw text across fragments; it only parses as
/// JSON once every fragment has arrived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallFragment {
    pub id: String,
    pub name: String,
    pub arguments_text: String,
}

impl ToolCallFragment {
    /// Opportunistically parse the accumulated arguments.
    ///
    /// Falls back to the raw string while the JSON is still incomplete.
    pub fn arguments_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.arguments_text)
            .unwrap_or_else(|_| serde_json::Value::String(self.arguments_text.clone()))
    }
}

/// The in-progress assistant message being assembled from stream frames.
#[derive(Debug, Clone, Default)]
pub struct AssistantDraft {
    /// Free-text content, append-only.
    content: String,
    /// Tool-call fragments keyed by the provider-assigned index.
    ///
    /// Indices are treated as opaque keys: sparse or out-of-order indices
    /// are fine, and a reused index continues the existing fragment.
    tool_calls: BTreeMap<u32, ToolCallFragment>,
    /// Usage for the exchange, set at most once.
    usage: Option<UsageRecord>,
}

impl AssistantDraft {
    /// Create an empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated free-text content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Tool-call fragments in index order.
    pub fn tool_calls(&self) -> impl Iterator<Item = (&u32, &ToolCallFragment)> {
        self.tool_calls.iter()
    }

    /// Whether any tool-call fragment exists.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Usage for the exchange, if the terminal usage event has arrived.
    pub fn usage(&self) -> Option<&UsageRecord> {
        self.usage.as_ref()
    }

    /// Whether nothing has been accumulated yet.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.tool_calls.is_empty() && self.usage.is_none()
    }

    /// Fold one decoded frame payload into the draft.
    ///
    /// Returns whether the draft changed. Malformed payloads are swallowed.
    pub fn apply_payload(&mut self, payload: &str) -> bool {
        match CompletionChunk::parse(payload) {
            Some(chunk) => self.apply_chunk(&chunk),
            None => false,
        }
    }

    /// Fold an already-parsed chunk into the draft.
    pub fn apply_chunk(&mut self, chunk: &CompletionChunk) -> bool {
        let mut changed = false;

        if let Some(usage) = &chunk.usage {
            // First usage event wins; later ones are ignored.
            if self.usage.is_none() {
                self.usage = Some(usage.clone());
                changed = true;
            } else {
                tracing::debug!("ignoring repeated usage event");
            }
        }

        for choice in &chunk.choices {
            if let Some(text) = &choice.delta.content {
                if !text.is_empty() {
                    self.content.push_str(text);
                    changed = true;
                }
            }
            if let Some(tool_calls) = &choice.delta.tool_calls {
                for delta in tool_calls {
                    changed |= self.apply_tool_call_delta(delta);
                }
            }
        }

        changed
    }

    /// Fold a non-streaming response body into the draft as one synthetic
    /// event.
    pub fn apply_response_body(&mut self, body: &str) -> bool {
        match CompletionResponse::parse(body) {
            Some(response) => self.apply_response(&response),
            None => false,
        }
    }

    /// Fold an already-parsed non-streaming response into the draft.
    pub fn apply_response(&mut self, response: &CompletionResponse) -> bool {
        let mut changed = false;
        if let Some(usage) = &response.usage {
            if self.usage.is_none() {
                self.usage = Some(usage.clone());
                changed = true;
            }
        }
        for choice in &response.choices {
            if let Some(text) = &choice.message.content {
                if !text.is_empty() {
                    self.content.push_str(text);
                    changed = true;
                }
            }
            if let Some(tool_calls) = &choice.message.tool_calls {
                for (i, call) in tool_calls.iter().enumerate() {
                    let fragment = self.tool_calls.entry(i as u32).or_default();
                    if fragment.id.is_empty() && !call.id.is_empty() {
                        fragment.id = call.id.clone();
                    }
                    if let Some(name) = &call.function.name {
                        if fragment.name.is_empty() && !name.is_empty() {
                            fragment.name = name.clone();
                        }
                    }
                    if let Some(arguments) = &call.function.arguments {
                        fragment.arguments_text.push_str(arguments);
                    }
                    changed = true;
                }
            }
        }
        changed
    }

    fn apply_tool_call_delta(&mut self, delta: &ToolCallDelta) -> bool {
        let fragment = self.tool_calls.entry(delta.index).or_default();
        let mut changed = false;

        // id and name are set once; an empty update never blanks them.
        if let Some(id) = &delta.id {
            if fragment.id.is_empty() && !id.is_empty() {
                fragment.id = id.clone();
                changed = true;
            }
        }
        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                if fragment.name.is_empty() && !name.is_empty() {
                    fragment.name = name.clone();
                    changed = true;
                }
            }
            if let Some(arguments) = &function.arguments {
                if !arguments.is_empty() {
                    fragment.arguments_text.push_str(arguments);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Presentation view of the draft.
    ///
    /// Plain text while no tool call exists; otherwise a structured object
    /// with the content (if non-empty) and the tool calls with their
    /// arguments opportunistically parsed. This is derived on demand and is
    /// not the authoritative draft state.
    pub fn display_value(&self) -> serde_json::Value {
        if self.tool_calls.is_empty() {
            return serde_json::Value::String(self.content.clone());
        }

        let calls: Vec<serde_json::Value> = self
            .tool_calls
            .values()
            .map(|fragment| {
                serde_json::json!({
                    "id": fragment.id,
                    "function": {
                        "name": fragment.name,
                        "arguments": fragment.arguments_value(),
                    },
                })
            })
            .collect();

        let mut object = serde_json::Map::new();
        if !self.content.is_empty() {
            object.insert(
                "content".to_string(),
                serde_json::Value::String(self.content.clone()),
            );
        }
        object.insert("tool_calls".to_string(), serde_json::Value::Array(calls));
        serde_json::Value::Object(object)
    }
}
