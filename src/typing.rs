//! Typing animation
//!
//! Text chunks are queued and revealed into the newest assistant message one
//! character at a time, at a fixed cadence independent of network arrival.
//! A single reveal task drains the queue in FIFO order.

use crate::transcript::Transcript;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct RevealState {
    queue: VecDeque<String>,
    busy: bool,
    /// Bumped by `clear`; a reveal task stops once its generation is stale
    generation: u64,
}

/// Single-consumer reveal queue
#[derive(Clone)]
pub struct TypingScheduler {
    state: Arc<Mutex<RevealState>>,
    transcript: Transcript,
    delay: Duration,
    idle: Arc<watch::Sender<bool>>,
}

impl TypingScheduler {
    pub fn new(transcript: Transcript, delay: Duration) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(RevealState::default())),
            transcript,
            delay,
            idle: Arc::new(idle),
        }
    }

    fn state(&self) -> MutexGuard<'_, RevealState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue text for reveal, starting the reveal task if idle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue(&self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        let mut state = self.state();
        self.push_locked(&mut state, text);
    }

    /// Queue text unless `cancel` has fired.
    ///
    /// The check happens under the queue lock, so text can never slip in
    /// after a cancel-then-`clear` sequence. Returns whether it was queued.
    pub fn enqueue_unless_cancelled(&self, text: impl Into<String>, cancel: &CancellationToken) -> bool {
        let text = text.into();
        let mut state = self.state();
        if cancel.is_cancelled() {
            return false;
        }
        if !text.is_empty() {
            self.push_locked(&mut state, text);
        }
        true
    }

    fn push_locked(&self, state: &mut RevealState, text: String) {
        state.queue.push_back(text);
        if state.busy {
            return;
        }
        state.busy = true;
        self.idle.send_replace(false);

        let generation = state.generation;
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.reveal(generation).await });
    }

    async fn reveal(self, generation: u64) {
        loop {
            let chunk = {
                let mut state = self.state();
                if state.generation != generation {
                    return;
                }
                if let Some(chunk) = state.queue.pop_front() {
                    chunk
                } else {
                    state.busy = false;
                    self.idle.send_replace(true);
                    return;
                }
            };

            let mut buf = [0u8; 4];
            for ch in chunk.chars() {
                if !self.is_live(generation) {
                    return;
                }
                self.transcript
                    .append_to_last_assistant(ch.encode_utf8(&mut buf));
                tokio::time::sleep(self.delay).await;
            }
        }
    }

    fn is_live(&self, generation: u64) -> bool {
        self.state().generation == generation
    }

    /// Drop all pending text and stop the reveal task.
    ///
    /// Characters already revealed stay; a task sleeping after its last
    /// character exits when it wakes without revealing more.
    pub fn clear(&self) {
        let mut state = self.state();
        let dropped = state.queue.len();
        state.queue.clear();
        state.busy = false;
        state.generation += 1;
        self.idle.send_replace(true);
        if dropped > 0 {
            tracing::debug!(dropped, "Cleared typing queue");
        }
    }

    /// Number of chunks waiting behind the one being revealed
    pub fn pending(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_busy(&self) -> bool {
        self.state().busy
    }

    /// Resolve once the queue has drained or been cleared
    pub async fn wait_idle(&self) {
        let mut rx = self.idle.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|idle| *idle).await;
    }
}
