//! Ordered conversation transcript
//!
//! Append-only, except that the newest assistant message grows in place while
//! its reply is revealed.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

const EVENT_CAPACITY: usize = 4096;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// Change notifications for a rendering surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Appended { index: usize, message: Message },
    Grew { index: usize, text: String },
}

/// Shared handle to the transcript
#[derive(Clone)]
pub struct Transcript {
    messages: Arc<Mutex<Vec<Message>>>,
    events: broadcast::Sender<TranscriptEvent>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    fn messages(&self) -> MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message, returning its index
    pub fn push(&self, message: Message) -> usize {
        let mut messages = self.messages();
        let index = messages.len();
        messages.push(message.clone());
        // No subscribers is fine
        let _ = self.events.send(TranscriptEvent::Appended { index, message });
        index
    }

    /// Grow the most recent assistant message; `None` if there is none
    pub fn append_to_last_assistant(&self, text: &str) -> Option<usize> {
        let mut messages = self.messages();
        let index = messages.iter().rposition(|m| m.role == Role::Assistant)?;
        messages[index].text.push_str(text);
        let _ = self.events.send(TranscriptEvent::Grew {
            index,
            text: text.to_string(),
        });
        Some(index)
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages().clone()
    }

    pub fn last(&self) -> Option<Message> {
        self.messages().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.events.subscribe()
    }

    /// Change stream for a renderer. A subscriber that falls behind skips
    /// the overwritten events and logs how many were lost.
    pub fn events(&self) -> impl Stream<Item = TranscriptEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Transcript subscriber lagged, events dropped");
                None
            }
        })
    }
}
