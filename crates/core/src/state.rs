//! The per-call lifecycle state machine.

use serde::Serialize;
use std::fmt;

/// Lifecycle of one bridged call. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Waiting for the telephony `start` event.
    AwaitingStart,
    /// Both sides attached; audio is relayed in both directions.
    Streaming,
    /// Tearing down both sockets.
    Closing,
    /// Terminal.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

impl SessionState {
    /// Moves to `next`.
    ///
    /// Returns `Ok(false)` when re-entering `Closed`, which is a no-op.
    /// Any move to an earlier or same non-terminal state is rejected.
    pub fn advance(&mut self, next: SessionState) -> Result<bool, InvalidTransition> {
        if *self == SessionState::Closed && next == SessionState::Closed {
            return Ok(false);
        }
        if next <= *self {
            return Err(InvalidTransition { from: *self, to: next });
        }
        *self = next;
        Ok(true)
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingStart => "AWAITING_START",
            SessionState::Streaming => "STREAMING",
            SessionState::Closing => "CLOSING",
            SessionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}
