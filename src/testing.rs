//! Mock implementations for testing
//!
//! These mocks enable testing the session and conversation layers without a
//! live agent server.

use crate::client::{AgentClient, ByteStream, RunRequest, TransportError};
use crate::store::{KeyValueStore, StoreError, StoreResult};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

// ============================================================================
// Mock Agent Client
// ============================================================================

/// Mock agent client that replays queued responses in order
#[derive(Default)]
pub struct MockAgentClient {
    sessions: Mutex<VecDeque<Result<Value, TransportError>>>,
    streams: Mutex<VecDeque<Result<ByteStream, TransportError>>>,
    session_calls: Mutex<usize>,
    /// Record of all turn requests made
    runs: Mutex<Vec<RunRequest>>,
}

impl MockAgentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a session-creation response body
    pub fn queue_session(&self, body: Value) {
        self.sessions.lock().unwrap().push_back(Ok(body));
    }

    pub fn queue_session_error(&self, error: TransportError) {
        self.sessions.lock().unwrap().push_back(Err(error));
    }

    /// Queue a response body delivered as the given chunks
    pub fn queue_stream(&self, chunks: Vec<Vec<u8>>) {
        self.queue_stream_results(chunks.into_iter().map(Ok).collect());
    }

    /// Queue a response body that may fail partway through
    pub fn queue_stream_results(&self, chunks: Vec<Result<Vec<u8>, TransportError>>) {
        self.streams
            .lock()
            .unwrap()
            .push_back(Ok(futures::stream::iter(chunks).boxed()));
    }

    /// Queue a response body fed by hand; dropping the sender ends it
    pub fn queue_channel_stream(&self) -> mpsc::Sender<Result<Vec<u8>, TransportError>> {
        let (tx, rx) = mpsc::channel(16);
        self.streams
            .lock()
            .unwrap()
            .push_back(Ok(ReceiverStream::new(rx).boxed()));
        tx
    }

    /// Queue a rejected turn request
    pub fn queue_run_error(&self, error: TransportError) {
        self.streams.lock().unwrap().push_back(Err(error));
    }

    pub fn session_calls(&self) -> usize {
        *self.session_calls.lock().unwrap()
    }

    pub fn recorded_runs(&self) -> Vec<RunRequest> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn create_session(&self, _app_name: &str, _user_id: &str) -> Result<Value, TransportError> {
        *self.session_calls.lock().unwrap() += 1;
        // Let concurrent callers interleave here
        tokio::task::yield_now().await;
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("No mock session queued")))
    }

    async fn run_sse(&self, request: &RunRequest) -> Result<ByteStream, TransportError> {
        self.runs.lock().unwrap().push(request.clone());
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("No mock stream queued")))
    }
}

// ============================================================================
// Failing Store
// ============================================================================

/// Store whose every operation fails
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Err(StoreError::Unavailable("read disabled".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("write disabled".to_string()))
    }

    fn remove(&self, _key: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("remove disabled".to_string()))
    }
}
