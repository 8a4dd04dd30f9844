//! Request structure for chat-completion calls.

use serde::{Deserialize, Serialize};

use super::message::ChatMessage;

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// Model to route to (e.g. "openai/gpt-4.1-mini")
    pub model: String,
    /// Full conversation history including the new user message
    pub messages: Vec<ChatMessage>,
    /// Whether to stream the response
    pub stream: bool,
    /// Thread to continue - None starts a new thread
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl CompletionRequest {
    /// Create a streaming request for a new thread.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            thread_id: None,
        }
    }

    /// Continue an existing thread (builder pattern).
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Disable streaming (builder pattern).
    ///
    /// The response then arrives as a single JSON body that is folded into
    /// the draft as one synthetic event.
    pub fn without_streaming(mut self) -> Self {
        self.stream = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_streaming() {
        let request = CompletionRequest::new("openai/gpt-4.1-mini", vec![ChatMessage::user("hi")]);
        assert!(request.stream);
        assert!(request.thread_id.is_none());
    }

    #[test]
    fn test_thread_id_omitted_when_absent() {
        let request = CompletionRequest::new("m", vec![]);
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("thread_id"));
    }

    #[test]
    fn test_thread_id_serialized_when_present() {
        let request = CompletionRequest::new("m", vec![]).with_thread("thread-9");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["thread_id"], "thread-9");
    }

    #[test]
    fn test_builder_chaining() {
        let request = CompletionRequest::new("m", vec![ChatMessage::user("q")])
            .with_thread("t-1")
            .without_streaming();
        assert_eq!(request.thread_id.as_deref(), Some("t-1"));
        assert!(!request.stream);
    }

    #[test]
    fn test_wire_shape_matches_gateway_contract() {
        let request =
            CompletionRequest::new("openai/gpt-4o", vec![ChatMessage::user("hello")]).with_thread("t");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "openai/gpt-4o",
                "messages": [{"role": "user", "content": "hello"}],
                "stream": true,
                "thread_id": "t"
            })
        );
    }
}
