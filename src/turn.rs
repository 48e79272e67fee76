//! Per-turn state machine
//!
//! `Idle -> EnsuringSession -> Requesting -> Streaming -> Idle`. Any active
//! phase may finish early (cancel or failure). Transitions are pure; the
//! conversation controller performs the I/O between them.

use serde::Serialize;
use thiserror::Error;

/// Where the current turn is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    EnsuringSession,
    Requesting,
    Streaming,
}

impl TurnPhase {
    /// Whether a turn is in flight (input disabled, cancel available)
    pub fn is_active(self) -> bool {
        !matches!(self, TurnPhase::Idle)
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    Failed,
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    Submit,
    SessionReady,
    ResponseStarted,
    Finished(TurnOutcome),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A turn is already in progress (cancel it first)")]
    Busy,
    #[error("Invalid transition: {event:?} while {phase:?}")]
    Invalid { phase: TurnPhase, event: TurnEvent },
}

/// Pure transition function
pub fn transition(phase: TurnPhase, event: TurnEvent) -> Result<TurnPhase, TransitionError> {
    match (phase, event) {
        (TurnPhase::Idle, TurnEvent::Submit) => Ok(TurnPhase::EnsuringSession),
        (_, TurnEvent::Submit) => Err(TransitionError::Busy),

        (TurnPhase::EnsuringSession, TurnEvent::SessionReady) => Ok(TurnPhase::Requesting),
        (TurnPhase::Requesting, TurnEvent::ResponseStarted) => Ok(TurnPhase::Streaming),

        // Only a successful stream may complete; anything active may cancel or fail
        (TurnPhase::Streaming, TurnEvent::Finished(TurnOutcome::Completed))
        | (
            TurnPhase::EnsuringSession | TurnPhase::Requesting | TurnPhase::Streaming,
            TurnEvent::Finished(TurnOutcome::Cancelled | TurnOutcome::Failed),
        ) => Ok(TurnPhase::Idle),

        (phase, event) => Err(TransitionError::Invalid { phase, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_happy_path() {
        let mut phase = TurnPhase::Idle;
        for (event, expected) in [
            (TurnEvent::Submit, TurnPhase::EnsuringSession),
            (TurnEvent::SessionReady, TurnPhase::Requesting),
            (TurnEvent::ResponseStarted, TurnPhase::Streaming),
            (TurnEvent::Finished(TurnOutcome::Completed), TurnPhase::Idle),
        ] {
            phase = transition(phase, event).unwrap();
            assert_eq!(phase, expected);
        }
    }

    #[test]
    fn test_submit_rejected_while_active() {
        for phase in [
            TurnPhase::EnsuringSession,
            TurnPhase::Requesting,
            TurnPhase::Streaming,
        ] {
            assert_eq!(transition(phase, TurnEvent::Submit), Err(TransitionError::Busy));
        }
    }

    #[test]
    fn test_session_failure_goes_straight_to_idle() {
        assert_eq!(
            transition(
                TurnPhase::EnsuringSession,
                TurnEvent::Finished(TurnOutcome::Failed)
            ),
            Ok(TurnPhase::Idle)
        );
    }

    #[test]
    fn test_cannot_complete_before_streaming() {
        assert!(transition(
            TurnPhase::Requesting,
            TurnEvent::Finished(TurnOutcome::Completed)
        )
        .is_err());
        assert!(transition(TurnPhase::Idle, TurnEvent::Finished(TurnOutcome::Cancelled)).is_err());
    }

    fn arb_event() -> impl Strategy<Value = TurnEvent> {
        prop_oneof![
            Just(TurnEvent::Submit),
            Just(TurnEvent::SessionReady),
            Just(TurnEvent::ResponseStarted),
            Just(TurnEvent::Finished(TurnOutcome::Completed)),
            Just(TurnEvent::Finished(TurnOutcome::Cancelled)),
            Just(TurnEvent::Finished(TurnOutcome::Failed)),
        ]
    }

    proptest! {
        #[test]
        fn errors_never_change_phase_and_submit_only_starts_from_idle(
            events in proptest::collection::vec(arb_event(), 0..32)
        ) {
            let mut phase = TurnPhase::Idle;
            for event in events {
                match transition(phase, event) {
                    Ok(next) => {
                        if event == TurnEvent::Submit {
                            prop_assert_eq!(phase, TurnPhase::Idle);
                        }
                        if let TurnEvent::Finished(_) = event {
                            prop_assert_eq!(next, TurnPhase::Idle);
                        }
                        phase = next;
                    }
                    Err(TransitionError::Busy) => prop_assert!(phase.is_active()),
                    Err(TransitionError::Invalid { phase: reported, .. }) => {
                        prop_assert_eq!(reported, phase);
                    }
                }
            }
        }
    }
}
