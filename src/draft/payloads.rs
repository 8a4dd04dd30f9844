//! Wire payload structs for decoded stream frames.
//!
//! These mirror the gateway's OpenAI-style chunk shape. Every field is
//! defaulted: providers omit whole sections freely and a missing field must
//! never fail deserialization of an otherwise valid chunk.

use serde::{Deserialize, Serialize};

/// Token usage for one exchange.
///
/// The gateway emits `prompt_tokens`/`completion_tokens`; some providers
/// already use `input_tokens`/`output_tokens`. Both spellings deserialize,
/// and serialization always produces the normalized `input_tokens`/
/// `output_tokens` naming consumers expect.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(
        rename(serialize = "input_tokens"),
        alias = "input_tokens",
        default
    )]
    pub prompt_tokens: u64,
    #[serde(
        rename(serialize = "output_tokens"),
        alias = "output_tokens",
        default
    )]
    pub completion_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// One non-terminal frame of a streaming completion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<UsageRecord>,
    #[serde(default)]
    pub model: Option<String>,
    /// In-band correlation identifiers some gateway events carry.
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    /// In-band error reported by the gateway.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl CompletionChunk {
    /// Parse a decoded frame payload.
    ///
    /// A malformed payload yields `None`; providers occasionally emit
    /// partial or broken chunks and those must not abort the exchange.
    pub fn parse(payload: &str) -> Option<Self> {
        match serde_json::from_str(payload) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed stream payload");
                None
            }
        }
    }

    /// The in-band error as display text, if one is present.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| match e {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// One choice inside a chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

/// Incremental delta inside a choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// One fragment of a tool invocation, keyed by `index` within the exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

/// Partial function name/arguments inside a tool-call fragment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Non-streaming completion response body.
///
/// Same `usage`/`model` shape as the streaming frames, but with a
/// materialized message instead of deltas.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: Option<UsageRecord>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl CompletionResponse {
    /// Parse a non-streaming response body.
    pub fn parse(body: &str) -> Option<Self> {
        match serde_json::from_str(body) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed completion body");
                None
            }
        }
    }

    /// The in-band error as display text, if one is present.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| match e {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseChoice {
    #[serde(default)]
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub function: FunctionDelta,
}
