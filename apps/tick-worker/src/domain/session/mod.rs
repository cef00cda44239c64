//! Feed Session State Machine
//!
//! One connection attempt to the live provider moves through:
//!
//! ```text
//! Connecting → Authenticated → Subscribed → Streaming → {Closed | Failed}
//! ```
//!
//! Any non-terminal state may end in `Closed` or `Failed`. Terminal states
//! accept no further transitions. A session is owned by exactly one live
//! client and never shared.

use std::time::{Duration, Instant};

/// State of a single live feed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Opening the WebSocket connection.
    Connecting,
    /// Credential sent.
    Authenticated,
    /// Per-symbol subscriptions sent.
    Subscribed,
    /// Routing inbound messages to the store.
    Streaming,
    /// Remote side closed the connection gracefully.
    Closed,
    /// Transport, authentication or protocol failure.
    Failed,
}

impl SessionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::Subscribed => "subscribed",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }

    /// Check if the session has ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// Check whether `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Closed | Self::Failed, _) => false,
            (_, Self::Closed | Self::Failed) => true,
            (Self::Connecting, Self::Authenticated)
            | (Self::Authenticated, Self::Subscribed)
            | (Self::Subscribed, Self::Streaming) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal session transition: {from} -> {to}")]
pub struct SessionError {
    /// State the session was in.
    pub from: SessionState,
    /// Requested state.
    pub to: SessionState,
}

/// One connection attempt to the live provider.
#[derive(Debug)]
pub struct FeedSession {
    attempt: u32,
    state: SessionState,
    started_at: Instant,
    reached_streaming: bool,
}

impl FeedSession {
    /// Start a new session in `Connecting`.
    #[must_use]
    pub fn new(attempt: u32) -> Self {
        Self {
            attempt,
            state: SessionState::Connecting,
            started_at: Instant::now(),
            reached_streaming: false,
        }
    }

    /// Attempt number (0 for the first connection).
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session ever reached `Streaming`.
    #[must_use]
    pub const fn reached_streaming(&self) -> bool {
        self.reached_streaming
    }

    /// Time since the session started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if `next` is not a legal successor.
    pub fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!(
            attempt = self.attempt,
            from = %self.state,
            to = %next,
            "Session transition"
        );

        if next == SessionState::Streaming {
            self.reached_streaming = true;
        }
        self.state = next;
        Ok(())
    }

    /// End the session as `Failed`. No-op if already terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Failed;
        }
    }

    /// End the session as `Closed`. No-op if already terminal.
    pub fn close(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_streaming() {
        let mut session = FeedSession::new(0);
        assert_eq!(session.state(), SessionState::Connecting);

        session.transition(SessionState::Authenticated).unwrap();
        session.transition(SessionState::Subscribed).unwrap();
        assert!(!session.reached_streaming());
        session.transition(SessionState::Streaming).unwrap();
        assert!(session.reached_streaming());

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.reached_streaming());
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut session = FeedSession::new(0);
        let err = session.transition(SessionState::Streaming).unwrap_err();
        assert_eq!(err.from, SessionState::Connecting);
        assert_eq!(err.to, SessionState::Streaming);
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut session = FeedSession::new(2);
        session.fail();
        assert_eq!(session.state(), SessionState::Failed);

        assert!(session.transition(SessionState::Authenticated).is_err());
        session.close();
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.attempt(), 2);
    }

    #[test]
    fn any_live_state_can_fail() {
        for state in [
            SessionState::Connecting,
            SessionState::Authenticated,
            SessionState::Subscribed,
            SessionState::Streaming,
        ] {
            assert!(state.can_transition_to(SessionState::Failed));
            assert!(state.can_transition_to(SessionState::Closed));
        }
    }
}
