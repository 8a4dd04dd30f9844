//! Gateway API client.
//!
//! Thin client over the `HttpClient` seam for the gateway's chat-completion
//! endpoint. Owns the request headers (auth, project, label hint, custom
//! caller headers) and the error-body convention; the session orchestrator
//! owns everything stateful.

use std::sync::Arc;

use crate::correlation::CorrelationState;
use crate::error::{ChatError, ChatResult, NetworkError};
use crate::models::CompletionRequest;
use crate::traits::{Headers, HttpClient, StreamResponse};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Configuration for a [`GatewayClient`].
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Base URL of the gateway, without a trailing slash.
    pub base_url: String,
    /// Bearer token, sent as `Authorization` when present.
    pub api_key: Option<String>,
    /// Project identifier, sent as `X-Project-Id` when present.
    pub project_id: Option<String>,
    /// Request origin hint, sent as `x-label` when present
    /// (e.g. "chat", "experiment").
    pub label: Option<String>,
    /// Thread title hint, sent as `X-Thread-Title` when present.
    pub thread_title: Option<String>,
    /// Custom headers merged in last; they win over the generated ones.
    pub extra_headers: Headers,
}

impl GatewayConfig {
    /// Create a config pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the bearer api key (builder pattern).
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the project identifier (builder pattern).
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Set the `x-label` hint (builder pattern).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the thread title hint (builder pattern).
    pub fn with_thread_title(mut self, title: impl Into<String>) -> Self {
        self.thread_title = Some(title.into());
        self
    }

    /// Add a custom header (builder pattern).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }
}

/// Client for the gateway's chat-completion API.
#[derive(Clone)]
pub struct GatewayClient {
    config: GatewayConfig,
    http: Arc<dyn HttpClient>,
}

impl GatewayClient {
    /// Create a client over the given transport.
    pub fn new(config: GatewayConfig, http: Arc<dyn HttpClient>) -> Self {
        Self { config, http }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        format!("{}{}", self.config.base_url, COMPLETIONS_PATH)
    }

    /// Request headers for one call, threading the current thread id into
    /// the exchange so the gateway continues the right conversation.
    fn build_headers(&self, correlation: &CorrelationState) -> Headers {
        let mut headers = Headers::new();
        if let Some(api_key) = &self.config.api_key {
            headers.insert("Authorization".to_string(), format!("Bearer {}", api_key));
        }
        if let Some(project_id) = &self.config.project_id {
            headers.insert("X-Project-Id".to_string(), project_id.clone());
        }
        if let Some(label) = &self.config.label {
            headers.insert("x-label".to_string(), label.clone());
        }
        if let Some(thread_id) = correlation.thread_id() {
            headers.insert("X-Thread-Id".to_string(), thread_id.to_string());
        }
        if let Some(title) = &self.config.thread_title {
            headers.insert("X-Thread-Title".to_string(), title.clone());
        }
        // Caller-supplied headers win.
        for (name, value) in &self.config.extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }

    /// Open a streaming completion.
    ///
    /// Resolves once status and headers are available; the body has not been
    /// consumed yet. Non-success statuses are returned as-is so the caller
    /// can read the error body.
    pub async fn open_stream(
        &self,
        request: &CompletionRequest,
        correlation: &CorrelationState,
    ) -> ChatResult<StreamResponse> {
        let url = self.completions_url();
        let body = serde_json::to_string(request).map_err(|e| {
            ChatError::Network(NetworkError::Other {
                message: format!("Failed to encode request: {}", e),
            })
        })?;
        let headers = self.build_headers(correlation);

        tracing::info!(url = %url, model = %request.model, "opening completion stream");
        let response = self.http.post_stream(&url, &body, &headers).await?;
        Ok(response)
    }

    /// Run a non-streaming completion, returning the raw response body.
    ///
    /// The caller folds the body into a draft via
    /// [`AssistantDraft::apply_response_body`](crate::draft::AssistantDraft::apply_response_body).
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        correlation: &CorrelationState,
    ) -> ChatResult<String> {
        let url = self.completions_url();
        let request = request.clone().without_streaming();
        let body = serde_json::to_string(&request).map_err(|e| {
            ChatError::Network(NetworkError::Other {
                message: format!("Failed to encode request: {}", e),
            })
        })?;
        let headers = self.build_headers(correlation);

        let response = self.http.post(&url, &body, &headers).await?;
        if !response.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(NetworkError::HttpStatus {
                status: response.status,
                message: extract_error_message(&text)
                    .unwrap_or_else(|| status_text(response.status)),
            }
            .into());
        }
        response.text().map_err(|e| {
            ChatError::Network(NetworkError::Other {
                message: format!("Response body was not UTF-8: {}", e),
            })
        })
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Pull the structured `error` field out of a response body, if present.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(o) => o
            .get("message")
            .and_then(|m| m.as_str())
            .map(|s| s.to_string())
            .or_else(|| Some(serde_json::Value::Object(o.clone()).to_string())),
        other => Some(other.to_string()),
    }
}

/// Fallback status text when the error body carries no message.
pub fn status_text(status: u16) -> String {
    let reason = match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Request Failed",
    };
    format!("{} ({})", reason, status)
}
