//! Mock HTTP client for tests.
//!
//! Scripted responses are consumed in FIFO order, one per request. Each
//! scripted stream yields its chunks with an optional per-chunk delay so
//! tests exercising cancellation have a real suspension point to interrupt.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::{Headers, HttpClient, HttpError, Response, StreamResponse};

/// One request observed by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub body: String,
    pub headers: Headers,
}

/// A scripted streaming response.
#[derive(Debug, Clone)]
pub struct ScriptedStream {
    pub status: u16,
    pub headers: Headers,
    pub chunks: Vec<Result<Bytes, HttpError>>,
    /// Delay before yielding each chunk. Zero means yield immediately
    /// (still a suspension point, via the stream poll).
    pub chunk_delay: Duration,
}

impl ScriptedStream {
    /// A 200 response whose body is `text` split into the given chunks.
    pub fn ok<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status: 200,
            headers: Headers::new(),
            chunks: chunks
                .into_iter()
                .map(|c| Ok(Bytes::from(c.into())))
                .collect(),
            chunk_delay: Duration::ZERO,
        }
    }

    /// A non-success response with the given error body.
    pub fn error(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Headers::new(),
            chunks: vec![Ok(Bytes::from(body.to_string()))],
            chunk_delay: Duration::ZERO,
        }
    }

    /// Attach a response header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Delay each chunk by `delay`.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

/// Mock implementation of [`HttpClient`].
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    scripts: Arc<Mutex<VecDeque<ScriptedStream>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    /// Create an empty mock; requests fail until a script is enqueued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a scripted response for the next request.
    pub fn enqueue(&self, script: ScriptedStream) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// All requests observed so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, url: &str, body: &str, headers: &Headers) {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            body: body.to_string(),
            headers: headers.clone(),
        });
    }

    fn next_script(&self) -> Result<ScriptedStream, HttpError> {
        self.scripts.lock().unwrap().pop_front().ok_or_else(|| {
            HttpError::Other {
                message: "mock: no scripted response".to_string(),
            }
        })
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record(url, body, headers);
        let script = self.next_script()?;
        let mut buf = Vec::new();
        for chunk in script.chunks {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Response::with_headers(
            script.status,
            script.headers,
            Bytes::from(buf),
        ))
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<StreamResponse, HttpError> {
        self.record(url, body, headers);
        let script = self.next_script()?;
        let delay = script.chunk_delay;

        let stream = futures_util::stream::unfold(
            script.chunks.into_iter().collect::<VecDeque<_>>(),
            move |mut chunks| async move {
                let next = chunks.pop_front()?;
                if delay > Duration::ZERO {
                    tokio::time::sleep(delay).await;
                } else {
                    tokio::task::yield_now().await;
                }
                Some((next, chunks))
            },
        );

        Ok(StreamResponse {
            status: script.status,
            headers: script.headers,
            body: Box::pin(stream),
        })
    }
}
