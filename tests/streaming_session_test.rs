//! End-to-end exchange tests over real HTTP.
//!
//! Runs a `Conversation` backed by the reqwest adapter against a wiremock
//! server replaying gateway responses.

use std::sync::Arc;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatstream::adapters::ReqwestHttpClient;
use chatstream::{
    ChatEvent, Conversation, EventSink, ExchangeOutcome, GatewayClient, GatewayConfig, Role,
};

/// Route crate logs through the test harness; `RUST_LOG` controls verbosity.
fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn sse_body(frames: &[&str]) -> String {
    let mut body = String::new();
    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push('\n');
    }
    body.push_str("data: [DONE]\n");
    body
}

fn conversation_for(
    server: &MockServer,
    config: impl FnOnce(GatewayConfig) -> GatewayConfig,
) -> (
    Conversation,
    tokio::sync::mpsc::UnboundedReceiver<ChatEvent>,
) {
    init_logging();
    let client = GatewayClient::new(
        config(GatewayConfig::new(server.uri())),
        Arc::new(ReqwestHttpClient::new()),
    );
    let (sink, rx) = EventSink::channel();
    let conv = Conversation::new(client, "test-model").with_events(sink);
    (conv, rx)
}

#[tokio::test]
async fn test_full_streamed_exchange() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"choices":[{"delta":{"content":"Hello"}}]}"#,
        r#"{"choices":[{"delta":{"content":", world"}}]}"#,
        r#"{"usage":{"prompt_tokens":9,"completion_tokens":4}}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Thread-Id", "thread-99")
                .insert_header("X-Trace-Id", "trace-3")
                .set_body_raw(body, "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (mut conv, mut rx) = conversation_for(&server, |c| c);
    let outcome = conv.submit("greet me").await;

    match outcome {
        ExchangeOutcome::Completed { usage } => {
            let usage = usage.expect("usage frame should be recorded");
            assert_eq!(usage.prompt_tokens, 9);
            assert_eq!(usage.completion_tokens, 4);
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(conv.messages().len(), 2);
    assert_eq!(conv.messages()[1].role, Role::Assistant);
    assert_eq!(conv.messages()[1].content, "Hello, world");
    assert_eq!(conv.correlation().thread_id(), Some("thread-99"));
    assert_eq!(conv.correlation().trace_id(), Some("trace-3"));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(events[0], ChatEvent::Started { .. }));
    assert!(matches!(events[1], ChatEvent::Processing { .. }));
    assert!(matches!(events[2], ChatEvent::Delta { first: true, .. }));
    assert!(matches!(events.last(), Some(ChatEvent::Finished { .. })));
}

#[tokio::test]
async fn test_request_carries_auth_and_project_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(header("X-Project-Id", "proj-1"))
        .and(header("x-label", "experiments"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&[r#"{"choices":[{"delta":{"content":"ok"}}]}"#]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (mut conv, _rx) = conversation_for(&server, |c| {
        c.with_api_key("sk-test")
            .with_project_id("proj-1")
            .with_label("experiments")
    });
    let outcome = conv.submit("hi").await;

    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_thread_id_learned_from_response_is_sent_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Thread-Id", "thread-7")
                .set_body_raw(sse_body(&[r#"{"choices":[{"delta":{"content":"a"}}]}"#]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (mut conv, _rx) = conversation_for(&server, |c| c);
    conv.submit("first").await;
    conv.submit("second").await;

    let requests = server.received_requests().await.expect("requests recorded");
    assert_eq!(requests.len(), 2);
    assert!(requests[0].headers.get("X-Thread-Id").is_none());
    assert_eq!(
        requests[1]
            .headers
            .get("X-Thread-Id")
            .and_then(|v| v.to_str().ok()),
        Some("thread-7")
    );
}

#[tokio::test]
async fn test_error_status_resolves_to_failed_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401).set_body_raw(
                r#"{"error":{"message":"invalid api key"}}"#,
                "application/json",
            ),
        )
        .mount(&server)
        .await;

    let (mut conv, mut rx) = conversation_for(&server, |c| c.with_api_key("bad"));
    let outcome = conv.submit("hi").await;

    assert!(outcome.is_failed());
    assert_eq!(conv.last_error(), Some("invalid api key"));
    assert_eq!(conv.messages().len(), 1);

    let mut saw_failed = false;
    while let Ok(event) = rx.try_recv() {
        if let ChatEvent::Failed { message, .. } = event {
            assert_eq!(message, "invalid api key");
            saw_failed = true;
        }
    }
    assert!(saw_failed);
}

#[tokio::test]
async fn test_non_streaming_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"choices":[{"message":{"role":"assistant","content":"complete answer"}}],"usage":{"input_tokens":5,"output_tokens":11}}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let (mut conv, _rx) = conversation_for(&server, |c| c);
    let outcome = conv.submit_non_streaming("hi").await;

    match outcome {
        ExchangeOutcome::Completed { usage } => {
            // Alternate usage field names normalize to the canonical pair.
            let usage = usage.expect("usage should parse from alias fields");
            assert_eq!(usage.prompt_tokens, 5);
            assert_eq!(usage.completion_tokens, 11);
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(conv.messages()[1].content, "complete answer");

    let requests = server.received_requests().await.expect("requests recorded");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["stream"], serde_json::json!(false));
}

#[tokio::test]
async fn test_connection_refused_is_a_network_failure() {
    init_logging();
    // Point at a server that is not listening.
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = GatewayClient::new(GatewayConfig::new(uri), Arc::new(ReqwestHttpClient::new()));
    let mut conv = Conversation::new(client, "test-model");

    let outcome = conv.submit("hi").await;

    assert!(outcome.is_failed());
    assert!(conv.last_error().is_some());
    assert!(!conv.is_active());
}
