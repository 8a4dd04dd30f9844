//! Exchange orchestration.
//!
//! [`Conversation`] owns the message history and drives one exchange at a
//! time through its lifecycle: append the user message, open the stream,
//! absorb correlation headers, fold decoded frames into the draft, finalize.
//! Observers follow along on the [`ChatEvent`] channel.
//!
//! At most one exchange is in flight per conversation. Submitting while one
//! is still active invalidates the previous exchange's token, so the old
//! stream loop winds down as a cancellation at its next suspension point.
//! Cancellation keeps everything accumulated so far and emits no failure.

mod exchange;

pub use exchange::{ExchangeOutcome, ExchangeSession};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;

use crate::cancel::CancellationController;
use crate::correlation::CorrelationState;
use crate::draft::{CompletionChunk, CompletionResponse};
use crate::error::{ChatError, NetworkError, StreamError};
use crate::events::{ChatEvent, EventSink};
use crate::gateway::{extract_error_message, status_text, GatewayClient};
use crate::models::{ChatMessage, CompletionRequest};
use crate::sse::FrameDecoder;
use crate::traits::HttpError;

/// Remote cancellation handle for a conversation.
///
/// Cloneable and usable from another task while the conversation itself is
/// mutably borrowed by an in-flight `submit`.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    controller: Arc<Mutex<CancellationController>>,
}

impl CancelHandle {
    /// Cancel the active exchange, if any. Idempotent.
    pub fn cancel(&self) {
        self.lock().cancel();
    }

    /// Whether an exchange is currently in flight.
    pub fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    fn lock(&self) -> MutexGuard<'_, CancellationController> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A conversation with the gateway: message history plus at most one active
/// exchange.
pub struct Conversation {
    client: GatewayClient,
    model: String,
    messages: Vec<ChatMessage>,
    correlation: CorrelationState,
    controller: Arc<Mutex<CancellationController>>,
    events: EventSink,
    last_error: Option<String>,
}

impl Conversation {
    /// Create a conversation with no subscribers.
    pub fn new(client: GatewayClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            messages: Vec::new(),
            correlation: CorrelationState::new(),
            controller: Arc::new(Mutex::new(CancellationController::new())),
            events: EventSink::discard(),
            last_error: None,
        }
    }

    /// Attach a notification sink.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Prepend a system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.messages.insert(0, ChatMessage::system(prompt));
        self
    }

    /// Continue an existing server-side thread.
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.correlation = CorrelationState::with_thread_id(thread_id);
        self
    }

    /// The message history, including any partial assistant message.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Correlation identifiers learned so far.
    pub fn correlation(&self) -> &CorrelationState {
        &self.correlation
    }

    /// The most recent surfaced error message, cleared on the next submit.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether an exchange is currently in flight.
    pub fn is_active(&self) -> bool {
        self.lock_controller().is_active()
    }

    /// Cancel the active exchange, if any.
    pub fn cancel(&self) {
        self.lock_controller().cancel();
    }

    /// A handle that can cancel from outside the `&mut self` borrow an
    /// in-flight submit holds.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            controller: Arc::clone(&self.controller),
        }
    }

    /// Submit a user message and stream the assistant's response.
    ///
    /// Empty (or whitespace-only) input is a no-op. The returned outcome
    /// mirrors the terminal event: `Completed` after `Finished`, `Failed`
    /// after `Failed`, and `Cancelled` after neither.
    pub async fn submit(&mut self, input: &str) -> ExchangeOutcome {
        let Some(mut session) = self.begin_exchange(input) else {
            return ExchangeOutcome::Completed { usage: None };
        };
        let request = CompletionRequest::new(&self.model, self.messages.clone());
        let token = session.token().clone();

        let opened = tokio::select! {
            _ = token.cancelled() => None,
            result = self.client.open_stream(&request, session.correlation()) => Some(result),
        };
        let response = match opened {
            None => return self.settle_cancelled(&session),
            Some(Err(error)) => return self.fail(&session, error),
            Some(Ok(response)) => response,
        };

        if !response.is_success() {
            let status = response.status;
            let body = match response.collect_body().await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                Err(_) => String::new(),
            };
            let message = extract_error_message(&body).unwrap_or_else(|| status_text(status));
            return self.fail(&session, NetworkError::HttpStatus { status, message }.into());
        }

        session.correlation_mut().absorb_headers(&response.headers);
        self.events.emit(ChatEvent::Processing {
            exchange_id: session.id(),
            correlation: session.correlation().clone(),
        });

        let mut body = response.body;
        let mut decoder = FrameDecoder::new();
        loop {
            let step = tokio::select! {
                _ = token.cancelled() => None,
                chunk = body.next() => Some(chunk),
            };
            let Some(next) = step else {
                return self.settle_cancelled(&session);
            };
            match next {
                Some(Ok(bytes)) => {
                    for payload in decoder.feed(&bytes) {
                        self.apply_frame(&mut session, &payload);
                    }
                    if decoder.is_done() {
                        break;
                    }
                }
                Some(Err(error)) => {
                    // The body breaking off mid-stream is a stream failure,
                    // not a request failure; cancellation stays cancellation.
                    let error = match error {
                        HttpError::Cancelled => ChatError::Network(NetworkError::Cancelled),
                        other => StreamError::ConnectionLost {
                            message: other.to_string(),
                        }
                        .into(),
                    };
                    return self.fail(&session, error);
                }
                None => {
                    // Source exhausted without a sentinel; the carry-over
                    // buffer may still hold one final unterminated frame.
                    if let Some(payload) = decoder.flush() {
                        self.apply_frame(&mut session, &payload);
                    }
                    break;
                }
            }
        }

        self.finalize(&session)
    }

    /// Submit without streaming: one request, one complete response body.
    ///
    /// Used when the gateway (or an intermediary) cannot stream. The
    /// response is folded into the draft as a single synthetic delta, so
    /// observers see the same event shape as a streamed exchange.
    pub async fn submit_non_streaming(&mut self, input: &str) -> ExchangeOutcome {
        let Some(mut session) = self.begin_exchange(input) else {
            return ExchangeOutcome::Completed { usage: None };
        };
        let request = CompletionRequest::new(&self.model, self.messages.clone());
        let token = session.token().clone();

        let result = tokio::select! {
            _ = token.cancelled() => None,
            result = self.client.complete(&request, session.correlation()) => Some(result),
        };
        let body = match result {
            None => return self.settle_cancelled(&session),
            Some(Err(error)) => return self.fail(&session, error),
            Some(Ok(body)) => body,
        };

        self.events.emit(ChatEvent::Processing {
            exchange_id: session.id(),
            correlation: session.correlation().clone(),
        });

        if let Some(response) = CompletionResponse::parse(&body) {
            if let Some(message) = response.error_message() {
                self.record_in_band_error(session.id(), message);
            } else if session.draft_mut().apply_response(&response) {
                self.sync_assistant_slot(&mut session);
            }
        }
        self.finalize(&session)
    }

    /// Start a new exchange: push the user message, rotate the cancellation
    /// token (invalidating any previous exchange) and announce the start.
    fn begin_exchange(&mut self, input: &str) -> Option<ExchangeSession> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.last_error = None;
        self.messages.push(ChatMessage::user(trimmed));

        let token = self.lock_controller().begin();
        let session = ExchangeSession::new(token, self.correlation.clone());
        tracing::info!(exchange = %session.id(), model = %self.model, "submitting message");
        self.events.emit(ChatEvent::Started {
            exchange_id: session.id(),
            correlation: session.correlation().clone(),
        });
        Some(session)
    }

    /// Fold one decoded frame payload into the exchange.
    ///
    /// Malformed payloads are dropped. In-band gateway errors are recorded
    /// as a recoverable signal without ending the exchange.
    fn apply_frame(&mut self, session: &mut ExchangeSession, payload: &str) {
        let Some(chunk) = CompletionChunk::parse(payload) else {
            return;
        };
        if let Some(message) = chunk.error_message() {
            self.record_in_band_error(session.id(), message);
            return;
        }
        session.correlation_mut().absorb_chunk(&chunk);
        if session.draft_mut().apply_chunk(&chunk) {
            self.sync_assistant_slot(session);
        }
    }

    /// Record an error the gateway reported inside an otherwise successful
    /// response. Recoverable: the exchange keeps going and still finishes.
    fn record_in_band_error(&mut self, exchange_id: uuid::Uuid, message: String) {
        let error = StreamError::InBandError { message };
        tracing::warn!(
            exchange = %exchange_id,
            code = error.error_code(),
            %error,
            "gateway reported an in-band error"
        );
        self.last_error = Some(error.user_message());
    }

    /// Mirror the draft into the newest assistant message, creating that
    /// slot on the first applied delta of the exchange.
    fn sync_assistant_slot(&mut self, session: &mut ExchangeSession) {
        let first = session.mark_first_delta();
        if first {
            self.messages.push(ChatMessage::assistant(""));
        }
        if let Some(slot) = self.messages.last_mut() {
            slot.content = session.display_text();
        }
        self.events.emit(ChatEvent::Delta {
            exchange_id: session.id(),
            first,
        });
    }

    fn finalize(&mut self, session: &ExchangeSession) -> ExchangeOutcome {
        self.correlation = session.correlation().clone();
        let usage = session.draft().usage().cloned();
        if let Some(usage) = &usage {
            tracing::debug!(
                exchange = %session.id(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "usage recorded"
            );
        }
        self.events.emit(ChatEvent::Finished {
            exchange_id: session.id(),
            correlation: self.correlation.clone(),
        });
        self.lock_controller().finish(session.token());
        tracing::info!(
            exchange = %session.id(),
            elapsed_ms = session.elapsed_ms(),
            "exchange finished"
        );
        ExchangeOutcome::Completed { usage }
    }

    /// Wind down a cancelled exchange: keep the accumulated draft and any
    /// identifiers learned, emit nothing, report a non-error outcome.
    fn settle_cancelled(&mut self, session: &ExchangeSession) -> ExchangeOutcome {
        self.correlation = session.correlation().clone();
        self.lock_controller().finish(session.token());
        tracing::info!(exchange = %session.id(), "exchange cancelled");
        ExchangeOutcome::Cancelled
    }

    fn fail(&mut self, session: &ExchangeSession, error: ChatError) -> ExchangeOutcome {
        // A failure observed after cancellation was requested is just the
        // transport tearing down; it stays a cancellation outcome.
        if error.is_cancellation() || session.token().is_cancelled() {
            return self.settle_cancelled(session);
        }
        let message = error.user_message();
        tracing::error!(
            exchange = %session.id(),
            code = error.error_code(),
            %error,
            "exchange failed"
        );
        self.correlation = session.correlation().clone();
        self.last_error = Some(message.clone());
        self.events.emit(ChatEvent::Failed {
            exchange_id: session.id(),
            correlation: session.correlation().clone(),
            message,
        });
        self.lock_controller().finish(session.token());
        ExchangeOutcome::Failed { error }
    }

    fn lock_controller(&self) -> MutexGuard<'_, CancellationController> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .field("correlation", &self.correlation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::sync::mpsc;

    use crate::adapters::mock::{MockHttpClient, ScriptedStream};
    use crate::gateway::GatewayConfig;
    use crate::models::Role;
    use crate::traits::{Headers, HttpError};

    fn conversation(mock: &MockHttpClient) -> (Conversation, mpsc::UnboundedReceiver<ChatEvent>) {
        let client = GatewayClient::new(
            GatewayConfig::new("http://gateway.test"),
            Arc::new(mock.clone()),
        );
        let (sink, rx) = EventSink::channel();
        (Conversation::new(client, "test-model").with_events(sink), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn content_frame(text: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{}\"}}}}]}}\n",
            text
        )
    }

    const USAGE_FRAME: &str =
        "data: {\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":5}}\n";
    const DONE_FRAME: &str = "data: [DONE]\n";

    #[tokio::test]
    async fn test_submit_streams_content_into_assistant_message() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::ok([
            content_frame("Hel"),
            content_frame("lo"),
            USAGE_FRAME.to_string(),
            DONE_FRAME.to_string(),
        ]));
        let (mut conv, mut rx) = conversation(&mock);

        let outcome = conv.submit("hi there").await;

        assert!(outcome.is_completed());
        if let ExchangeOutcome::Completed { usage } = outcome {
            let usage = usage.unwrap();
            assert_eq!(usage.prompt_tokens, 3);
            assert_eq!(usage.completion_tokens, 5);
        }
        assert_eq!(conv.messages().len(), 2);
        assert_eq!(conv.messages()[0].role, Role::User);
        assert_eq!(conv.messages()[0].content, "hi there");
        assert_eq!(conv.messages()[1].role, Role::Assistant);
        assert_eq!(conv.messages()[1].content, "Hello");
        assert!(!conv.is_active());

        let events = drain(&mut rx);
        assert!(matches!(events[0], ChatEvent::Started { .. }));
        assert!(matches!(events[1], ChatEvent::Processing { .. }));
        assert!(matches!(events[2], ChatEvent::Delta { first: true, .. }));
        assert!(matches!(events[3], ChatEvent::Delta { first: false, .. }));
        assert!(matches!(events.last(), Some(ChatEvent::Finished { .. })));
    }

    #[tokio::test]
    async fn test_tool_call_fragments_assembled_across_frames() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::ok([
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"search\",\"arguments\":\"{\\\"qu\"}}]}}]}\n".to_string(),
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"ery\\\":\\\"rust\\\"}\"}}]}}]}\n".to_string(),
            DONE_FRAME.to_string(),
        ]));
        let (mut conv, _rx) = conversation(&mock);

        let outcome = conv.submit("find it").await;

        assert!(outcome.is_completed());
        let assistant = &conv.messages()[1].content;
        assert!(assistant.contains("\"search\""));
        assert!(assistant.contains("\"query\":\"rust\""));
    }

    #[tokio::test]
    async fn test_http_error_status_emits_failed() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::error(
            429,
            r#"{"error":{"message":"rate limited"}}"#,
        ));
        let (mut conv, mut rx) = conversation(&mock);

        let outcome = conv.submit("hi").await;

        assert!(outcome.is_failed());
        assert_eq!(conv.last_error(), Some("rate limited"));
        // No assistant slot was ever created.
        assert_eq!(conv.messages().len(), 1);
        assert!(!conv.is_active());

        let events = drain(&mut rx);
        match events.last() {
            Some(ChatEvent::Failed { message, .. }) => assert_eq!(message, "rate limited"),
            other => panic!("expected Failed event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_status_without_message_uses_status_text() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::error(503, "no json here"));
        let (mut conv, _rx) = conversation(&mock);

        let outcome = conv.submit("hi").await;

        assert!(outcome.is_failed());
        assert_eq!(conv.last_error(), Some("Service Unavailable (503)"));
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream_keeps_partial_draft() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream {
            status: 200,
            headers: Headers::new(),
            chunks: vec![
                Ok(Bytes::from(content_frame("partial"))),
                Err(HttpError::ConnectionFailed {
                    url: "http://gateway.test".to_string(),
                    message: "reset by peer".to_string(),
                }),
            ],
            chunk_delay: Duration::ZERO,
        });
        let (mut conv, mut rx) = conversation(&mock);

        let outcome = conv.submit("hi").await;

        match outcome {
            ExchangeOutcome::Failed { error } => {
                // A body that breaks off mid-stream is a stream failure.
                assert!(matches!(
                    error,
                    ChatError::Stream(StreamError::ConnectionLost { .. })
                ));
                assert!(error.is_retryable());
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(conv.messages()[1].content, "partial");
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(ChatEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_is_not_an_error() {
        let mock = MockHttpClient::new();
        mock.enqueue(
            ScriptedStream::ok([
                content_frame("Hel"),
                content_frame("lo"),
                DONE_FRAME.to_string(),
            ])
            .with_chunk_delay(Duration::from_millis(100)),
        );
        let (mut conv, mut rx) = conversation(&mock);

        let handle = conv.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            handle.cancel();
        });

        let outcome = conv.submit("hi").await;

        assert!(outcome.is_cancelled());
        // The partial response stays in place.
        assert_eq!(conv.messages().len(), 2);
        assert_eq!(conv.messages()[1].content, "Hel");
        assert_eq!(conv.last_error(), None);
        assert!(!conv.is_active());

        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, ChatEvent::Failed { .. })));
        assert!(!events.iter().any(|e| matches!(e, ChatEvent::Finished { .. })));
    }

    #[tokio::test]
    async fn test_new_submission_supersedes_active_exchange() {
        let mock = MockHttpClient::new();
        // First exchange stalls before its first chunk.
        mock.enqueue(
            ScriptedStream::ok([content_frame("stalled"), DONE_FRAME.to_string()])
                .with_chunk_delay(Duration::from_secs(30)),
        );
        mock.enqueue(ScriptedStream::ok([
            content_frame("second"),
            DONE_FRAME.to_string(),
        ]));
        let (mut conv, mut rx) = conversation(&mock);

        {
            let mut first = Box::pin(conv.submit("one"));
            let poll = tokio::time::timeout(Duration::from_millis(50), first.as_mut()).await;
            assert!(poll.is_err(), "first exchange should still be streaming");
        }

        let outcome = conv.submit("two").await;

        assert!(outcome.is_completed());
        let contents: Vec<&str> = conv.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "second"]);
        assert_eq!(mock.requests().len(), 2);

        let events = drain(&mut rx);
        let finished = events
            .iter()
            .filter(|e| matches!(e, ChatEvent::Finished { .. }))
            .count();
        assert_eq!(finished, 1);
    }

    #[tokio::test]
    async fn test_malformed_frames_are_skipped() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::ok([
            content_frame("keep"),
            "data: {not json at all\n".to_string(),
            content_frame(" this"),
            DONE_FRAME.to_string(),
        ]));
        let (mut conv, _rx) = conversation(&mock);

        let outcome = conv.submit("hi").await;

        assert!(outcome.is_completed());
        assert_eq!(conv.messages()[1].content, "keep this");
    }

    #[tokio::test]
    async fn test_frames_after_sentinel_are_ignored() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::ok([
            content_frame("done"),
            DONE_FRAME.to_string(),
            content_frame(" extra"),
        ]));
        let (mut conv, _rx) = conversation(&mock);

        conv.submit("hi").await;

        assert_eq!(conv.messages()[1].content, "done");
    }

    #[tokio::test]
    async fn test_in_band_error_is_recoverable() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::ok([
            "data: {\"error\":\"quota warning\"}\n".to_string(),
            content_frame("still here"),
            DONE_FRAME.to_string(),
        ]));
        let (mut conv, mut rx) = conversation(&mock);

        let outcome = conv.submit("hi").await;

        assert!(outcome.is_completed());
        assert_eq!(conv.last_error(), Some("quota warning"));
        assert_eq!(conv.messages()[1].content, "still here");
        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, ChatEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_thread_id_from_headers_flows_to_next_request() {
        let mock = MockHttpClient::new();
        mock.enqueue(
            ScriptedStream::ok([content_frame("a"), DONE_FRAME.to_string()])
                .with_header("X-Thread-Id", "thread-42")
                .with_header("x-run-id", "run-7"),
        );
        mock.enqueue(ScriptedStream::ok([
            content_frame("b"),
            DONE_FRAME.to_string(),
        ]));
        let (mut conv, _rx) = conversation(&mock);

        conv.submit("first").await;
        assert_eq!(conv.correlation().thread_id(), Some("thread-42"));
        assert_eq!(conv.correlation().run_id(), Some("run-7"));

        conv.submit("second").await;
        let requests = mock.requests();
        assert_eq!(
            requests[1].headers.get("X-Thread-Id"),
            Some(&"thread-42".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_a_noop() {
        let mock = MockHttpClient::new();
        let (mut conv, mut rx) = conversation(&mock);

        let outcome = conv.submit("   ").await;

        assert!(outcome.is_completed());
        assert!(conv.messages().is_empty());
        assert!(mock.requests().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_failed_submit_clears_on_retry() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::error(500, r#"{"error":"boom"}"#));
        mock.enqueue(ScriptedStream::ok([
            content_frame("recovered"),
            DONE_FRAME.to_string(),
        ]));
        let (mut conv, _rx) = conversation(&mock);

        conv.submit("try").await;
        assert_eq!(conv.last_error(), Some("boom"));

        let outcome = conv.submit("again").await;
        assert!(outcome.is_completed());
        assert_eq!(conv.last_error(), None);
    }

    #[tokio::test]
    async fn test_non_streaming_submit_folds_whole_response() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::ok([
            r#"{"choices":[{"message":{"role":"assistant","content":"full answer"}}],"usage":{"prompt_tokens":2,"completion_tokens":4}}"#,
        ]));
        let (mut conv, mut rx) = conversation(&mock);

        let outcome = conv.submit_non_streaming("hi").await;

        assert!(outcome.is_completed());
        if let ExchangeOutcome::Completed { usage } = outcome {
            assert_eq!(usage.unwrap().completion_tokens, 4);
        }
        assert_eq!(conv.messages()[1].content, "full answer");
        // Request body must carry stream:false.
        assert!(mock.requests()[0].body.contains("\"stream\":false"));

        let events = drain(&mut rx);
        assert!(matches!(events[0], ChatEvent::Started { .. }));
        assert!(matches!(events[1], ChatEvent::Processing { .. }));
        assert!(matches!(events[2], ChatEvent::Delta { first: true, .. }));
        assert!(matches!(events[3], ChatEvent::Finished { .. }));
    }

    #[tokio::test]
    async fn test_non_streaming_in_band_error_is_recorded() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::ok([r#"{"error":"model overloaded"}"#]));
        let (mut conv, mut rx) = conversation(&mock);

        let outcome = conv.submit_non_streaming("hi").await;

        // Recoverable, exactly as on the streaming path: the exchange
        // finishes, the error is surfaced, no assistant slot is created.
        assert!(outcome.is_completed());
        assert_eq!(conv.last_error(), Some("model overloaded"));
        assert_eq!(conv.messages().len(), 1);
        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, ChatEvent::Failed { .. })));
        assert!(matches!(events.last(), Some(ChatEvent::Finished { .. })));
    }

    #[tokio::test]
    async fn test_system_prompt_precedes_history() {
        let mock = MockHttpClient::new();
        mock.enqueue(ScriptedStream::ok([
            content_frame("ok"),
            DONE_FRAME.to_string(),
        ]));
        let client = GatewayClient::new(
            GatewayConfig::new("http://gateway.test"),
            Arc::new(mock.clone()),
        );
        let mut conv =
            Conversation::new(client, "test-model").with_system_prompt("be terse");

        conv.submit("hi").await;

        assert_eq!(conv.messages()[0].role, Role::System);
        let body = &mock.requests()[0].body;
        assert!(body.contains("\"system\""));
        assert!(body.contains("be terse"));
    }

    #[tokio::test]
    async fn test_stream_without_sentinel_still_finalizes() {
        let mock = MockHttpClient::new();
        // Final frame has no trailing newline and no [DONE].
        mock.enqueue(ScriptedStream::ok([
            content_frame("almost"),
            "data: {\"choices\":[{\"delta\":{\"content\":\" done\"}}]}".to_string(),
        ]));
        let (mut conv, mut rx) = conversation(&mock);

        let outcome = conv.submit("hi").await;

        assert!(outcome.is_completed());
        assert_eq!(conv.messages()[1].content, "almost done");
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(ChatEvent::Finished { .. })));
    }
}
