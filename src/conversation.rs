//! Conversation controller
//!
//! Drives one turn at a time: ensure a session, open the streaming request,
//! decode frames, extract text and hand it to the typing scheduler. Errors are
//! absorbed here and surface only as a notice in the transcript.

use crate::client::{AgentClient, RunRequest, TransportError};
use crate::config::ClientConfig;
use crate::payload;
use crate::session::{SessionCreationError, SessionManager};
use crate::sse::decode_stream;
use crate::store::KeyValueStore;
use crate::transcript::{Message, Transcript};
use crate::turn::{transition, TurnEvent, TurnOutcome, TurnPhase};
use crate::typing::TypingScheduler;
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Appended to the transcript when a turn fails
pub const ERROR_NOTICE: &str = "\n[Error receiving response]";

/// Why a turn ended without completing
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Session(#[from] SessionCreationError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Cancelled by user")]
    Cancelled,
}

/// Why `submit` did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("Message is empty")]
    Empty,
    #[error("A turn is already in progress")]
    Busy,
}

struct ActiveTurn {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Control {
    phase: TurnPhase,
    active: Option<ActiveTurn>,
    next_turn: u64,
}

/// A single conversation with the agent server
pub struct Conversation<C, K> {
    client: Arc<C>,
    sessions: SessionManager<C, K>,
    transcript: Transcript,
    typing: TypingScheduler,
    app_name: String,
    user_id: String,
    control: Mutex<Control>,
    phase_tx: watch::Sender<TurnPhase>,
}

impl<C, K> Conversation<C, K>
where
    C: AgentClient,
    K: KeyValueStore,
{
    pub fn new(client: C, store: K, config: &ClientConfig) -> Self {
        let client = Arc::new(client);
        let sessions = SessionManager::new(
            Arc::clone(&client),
            store,
            config.session_key.clone(),
            config.app_name.clone(),
            config.user_id.clone(),
        );
        let transcript = Transcript::new();
        let typing = TypingScheduler::new(transcript.clone(), config.typing_delay);
        let (phase_tx, _) = watch::channel(TurnPhase::Idle);

        Self {
            client,
            sessions,
            transcript,
            typing,
            app_name: config.app_name.clone(),
            user_id: config.user_id.clone(),
            control: Mutex::new(Control::default()),
            phase_tx,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn typing(&self) -> &TypingScheduler {
        &self.typing
    }

    pub fn sessions(&self) -> &SessionManager<C, K> {
        &self.sessions
    }

    pub fn phase(&self) -> TurnPhase {
        self.control().phase
    }

    pub fn is_streaming(&self) -> bool {
        self.phase().is_active()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<TurnPhase> {
        self.phase_tx.subscribe()
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, control: &mut Control, phase: TurnPhase) {
        control.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    /// Run one turn for `text`. Resolves when the response stream ends,
    /// fails or is cancelled; typing may still be revealing afterwards.
    pub async fn submit(&self, text: &str) -> Result<TurnOutcome, SubmitRejected> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitRejected::Empty);
        }

        let (turn_id, cancel) = {
            let mut control = self.control();
            let phase = transition(control.phase, TurnEvent::Submit)
                .map_err(|_| SubmitRejected::Busy)?;
            let id = control.next_turn;
            control.next_turn += 1;
            let cancel = CancellationToken::new();
            control.active = Some(ActiveTurn {
                id,
                cancel: cancel.clone(),
            });
            self.set_phase(&mut control, phase);
            (id, cancel)
        };

        self.transcript.push(Message::user(text));
        self.transcript.push(Message::assistant(""));

        let outcome = match self.run_turn(turn_id, text, &cancel).await {
            Ok(()) => TurnOutcome::Completed,
            Err(TurnError::Cancelled) => {
                tracing::info!(turn = turn_id, "Turn cancelled");
                TurnOutcome::Cancelled
            }
            Err(e) => {
                tracing::error!(turn = turn_id, error = %e, "Turn failed");
                // Let already-received text finish before the notice
                self.typing.wait_idle().await;
                if cancel.is_cancelled() {
                    TurnOutcome::Cancelled
                } else {
                    self.transcript.push(Message::assistant(ERROR_NOTICE));
                    TurnOutcome::Failed
                }
            }
        };

        self.finish(turn_id, outcome);
        Ok(outcome)
    }

    async fn run_turn(
        &self,
        turn_id: u64,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TurnError> {
        let session_id = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TurnError::Cancelled),
            result = self.sessions.ensure_session() => result?,
        };
        self.advance(turn_id, TurnEvent::SessionReady)?;

        let request = RunRequest::user_text(&self.app_name, &self.user_id, &session_id, text);
        tracing::info!(turn = turn_id, session_id = %session_id, "Sending turn");
        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TurnError::Cancelled),
            result = self.client.run_sse(&request) => result?,
        };
        self.advance(turn_id, TurnEvent::ResponseStarted)?;

        let mut frames = std::pin::pin!(decode_stream(body));
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TurnError::Cancelled),
                next = frames.next() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    let text = payload::extract(&frame.data);
                    tracing::debug!(
                        turn = turn_id,
                        raw_len = frame.data.len(),
                        text_len = text.len(),
                        "Decoded frame"
                    );
                    if !self.typing.enqueue_unless_cancelled(text, cancel) {
                        return Err(TurnError::Cancelled);
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    tracing::info!(turn = turn_id, "Turn stream finished");
                    return Ok(());
                }
            }
        }
    }

    /// Move the active turn forward; a turn that was cancelled meanwhile is stale
    fn advance(&self, turn_id: u64, event: TurnEvent) -> Result<(), TurnError> {
        let mut control = self.control();
        if control.active.as_ref().map(|turn| turn.id) != Some(turn_id) {
            return Err(TurnError::Cancelled);
        }
        match transition(control.phase, event) {
            Ok(phase) => {
                self.set_phase(&mut control, phase);
                Ok(())
            }
            Err(e) => {
                // Unreachable while turns are serialized through `submit`
                tracing::error!(turn = turn_id, error = %e, "Rejected turn transition");
                Err(TurnError::Cancelled)
            }
        }
    }

    fn finish(&self, turn_id: u64, outcome: TurnOutcome) {
        let mut control = self.control();
        if control.active.as_ref().map(|turn| turn.id) != Some(turn_id) {
            // Already torn down by `cancel`
            return;
        }
        control.active = None;
        let phase = transition(control.phase, TurnEvent::Finished(outcome)).unwrap_or_default();
        self.set_phase(&mut control, phase);
    }

    /// Abort the in-flight turn and drop any text not yet revealed.
    ///
    /// Returns whether a turn was active. The typing queue is empty when this
    /// returns.
    pub fn cancel(&self) -> bool {
        let active = {
            let mut control = self.control();
            let active = control.active.take();
            if let Some(turn) = &active {
                turn.cancel.cancel();
                let phase = transition(control.phase, TurnEvent::Finished(TurnOutcome::Cancelled))
                    .unwrap_or_default();
                self.set_phase(&mut control, phase);
                tracing::info!(turn = turn.id, "Cancel requested");
            }
            active
        };
        self.typing.clear();
        active.is_some()
    }
}
