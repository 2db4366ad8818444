//! Explicit play phase machine: idle → resolving → revealing → settled.
//!
//! Transitions are driven by events rather than chained timers, so a play
//! that is abandoned mid-reveal is simply aborted back to idle instead of
//! leaving a pending callback behind.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlayPhase {
    #[default]
    Idle,
    Resolving,
    Revealing,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayEvent {
    /// Player triggered a play.
    Start,
    /// The outcome has been decided.
    Resolve,
    /// Presentation of the decided outcome finished.
    RevealComplete,
    /// Player dismissed the result.
    Acknowledge,
    /// Play abandoned (view closed, error while resolving).
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: PlayPhase,
    pub event: PlayEvent,
    pub to: PlayPhase,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("event {event:?} is not valid in phase {from:?}")]
    InvalidTransition { from: PlayPhase, event: PlayEvent },
}

/// Transitions taken during the current play.
pub type PhaseHistory = SmallVec<[PhaseTransition; 4]>;

/// Next phase for `event`, or `None` if the event is not accepted.
#[must_use]
pub const fn next_phase(from: PlayPhase, event: PlayEvent) -> Option<PlayPhase> {
    match (from, event) {
        (PlayPhase::Idle, PlayEvent::Start) => Some(PlayPhase::Resolving),
        (PlayPhase::Resolving, PlayEvent::Resolve) => Some(PlayPhase::Revealing),
        (PlayPhase::Revealing, PlayEvent::RevealComplete) => Some(PlayPhase::Settled),
        (PlayPhase::Settled, PlayEvent::Acknowledge) => Some(PlayPhase::Idle),
        (PlayPhase::Resolving | PlayPhase::Revealing | PlayPhase::Settled, PlayEvent::Abort) => {
            Some(PlayPhase::Idle)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMachine {
    phase: PlayPhase,
    history: PhaseHistory,
}

impl PhaseMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn phase(&self) -> PlayPhase {
        self.phase
    }

    #[must_use]
    pub fn history(&self) -> &[PhaseTransition] {
        &self.history
    }

    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self.phase, PlayPhase::Resolving | PlayPhase::Revealing)
    }

    /// Apply `event`, recording the transition.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseError::InvalidTransition`] and leaves the phase
    /// unchanged when `event` is not accepted in the current phase.
    pub fn apply(&mut self, event: PlayEvent) -> Result<PlayPhase, PhaseError> {
        let from = self.phase;
        let to = next_phase(from, event).ok_or(PhaseError::InvalidTransition { from, event })?;
        if event == PlayEvent::Start {
            self.history.clear();
        }
        self.history.push(PhaseTransition { from, event, to });
        self.phase = to;
        Ok(to)
    }

    /// Return to idle from wherever the play currently is.
    pub fn abort(&mut self) {
        if self.phase != PlayPhase::Idle {
            let from = self.phase;
            self.history.push(PhaseTransition {
                from,
                event: PlayEvent::Abort,
                to: PlayPhase::Idle,
            });
            self.phase = PlayPhase::Idle;
        }
    }

    /// Take the transition history of the finished play.
    pub fn take_history(&mut self) -> PhaseHistory {
        std::mem::take(&mut self.history)
    }
}
