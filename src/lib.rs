//! Agent Chat - streaming session client for a conversational agent server
//!
//! Bootstraps a server session, streams each turn's reply as server-sent
//! events and reveals the decoded text into a transcript with a typing
//! animation that runs independently of network arrival.

pub mod client;
pub mod config;
pub mod conversation;
pub mod payload;
pub mod session;
pub mod sse;
pub mod store;
pub mod transcript;
pub mod turn;
pub mod typing;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AgentClient, HttpAgentClient, LoggingClient, TransportError, TransportErrorKind};
pub use config::ClientConfig;
pub use conversation::{Conversation, SubmitRejected, TurnError, ERROR_NOTICE};
pub use session::{SessionCreationError, SessionId, SessionManager};
pub use sse::{decode_stream, Frame, FrameDecoder};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError};
pub use transcript::{Message, Role, Transcript, TranscriptEvent};
pub use turn::{TurnOutcome, TurnPhase};
pub use typing::TypingScheduler;
