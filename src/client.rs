//! HTTP transport to the agent server
//!
//! Two endpoints are used: session creation and the streaming `run_sse` turn.

mod error;
mod types;

pub use error::{TransportError, TransportErrorKind};
pub use types::{CreateSessionRequest, NewMessage, Part, RunRequest};

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Raw response body of a streaming turn, in arrival order
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Client for the agent server
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Create a session and return the decoded response body
    async fn create_session(&self, app_name: &str, user_id: &str) -> Result<Value, TransportError>;

    /// Start a turn; resolves once response headers arrive
    async fn run_sse(&self, request: &RunRequest) -> Result<ByteStream, TransportError>;
}

#[async_trait]
impl<T: AgentClient + ?Sized> AgentClient for Arc<T> {
    async fn create_session(&self, app_name: &str, user_id: &str) -> Result<Value, TransportError> {
        (**self).create_session(app_name, user_id).await
    }

    async fn run_sse(&self, request: &RunRequest) -> Result<ByteStream, TransportError> {
        (**self).run_sse(request).await
    }
}

/// `reqwest`-backed client
pub struct HttpAgentClient {
    client: Client,
    base_url: String,
}

impl HttpAgentClient {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        // No overall timeout: a streamed turn stays open as long as the agent talks.
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn sessions_url(&self, app_name: &str, user_id: &str) -> String {
        format!("{}/apps/{app_name}/users/{user_id}/sessions", self.base_url)
    }

    fn run_sse_url(&self) -> String {
        format!("{}/run_sse", self.base_url)
    }
}

async fn status_error(response: reqwest::Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TransportError::status(status, &body)
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn create_session(&self, app_name: &str, user_id: &str) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(self.sessions_url(app_name, user_id))
            .json(&CreateSessionRequest::default())
            .send()
            .await
            .map_err(|e| TransportError::from_send(&e))?;

        tracing::debug!(status = %response.status(), "Session creation response");

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::read(format!("Failed to read response: {e}")))?;

        serde_json::from_str(&body).map_err(|e| {
            TransportError::decode(format!("Failed to parse session response: {e} - body: {body}"))
        })
    }

    async fn run_sse(&self, request: &RunRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(self.run_sse_url())
            .header("accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::from_send(&e))?;

        tracing::debug!(status = %response.status(), "run_sse response");

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| TransportError::read(format!("Stream read failed: {e}")))
            })
            .boxed())
    }
}

/// Logging wrapper for agent clients
pub struct LoggingClient<C> {
    inner: C,
}

impl<C: AgentClient> LoggingClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: AgentClient> AgentClient for LoggingClient<C> {
    async fn create_session(&self, app_name: &str, user_id: &str) -> Result<Value, TransportError> {
        let start = std::time::Instant::now();
        let result = self.inner.create_session(app_name, user_id).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    app_name,
                    user_id,
                    duration_ms = %duration.as_millis(),
                    "Session request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    app_name,
                    user_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.is_retryable(),
                    "Session request failed"
                );
            }
        }

        result
    }

    async fn run_sse(&self, request: &RunRequest) -> Result<ByteStream, TransportError> {
        let start = std::time::Instant::now();
        let result = self.inner.run_sse(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    session_id = %request.session_id,
                    duration_ms = %duration.as_millis(),
                    "Turn stream opened"
                );
            }
            Err(e) => {
                tracing::error!(
                    session_id = %request.session_id,
                    duration_ms = %duration.as_millis(),
                    status = ?e.status,
                    error = %e.message,
                    retryable = e.is_retryable(),
                    "Turn request failed"
                );
            }
        }

        result
    }
}
