//! Feed Status
//!
//! Shared, lock-light view of what the ingestion pipeline is doing. Written
//! by the supervisor, the live client and the publisher; read by the health
//! server.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::session::SessionState;

/// Which feed the supervisor is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Supervisor has not started a feed yet.
    Starting,
    /// Live provider feed.
    Live,
    /// Simulated feed, selected because no credential is configured.
    Simulated,
    /// Simulated feed, selected after the live feed failed.
    Fallback,
}

impl FeedMode {
    /// Get the mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Live => "live",
            Self::Simulated => "simulated",
            Self::Fallback => "fallback",
        }
    }
}

/// Shared feed status.
#[derive(Debug)]
pub struct FeedStatus {
    mode: parking_lot::RwLock<FeedMode>,
    session_state: parking_lot::RwLock<Option<SessionState>>,
    last_error: parking_lot::RwLock<Option<String>>,
    last_published_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    ticks_published: AtomicU64,
    publish_failures: AtomicU64,
    messages_dropped: AtomicU64,
    reconnect_attempts: AtomicU32,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStatus {
    /// Create status in `Starting` mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: parking_lot::RwLock::new(FeedMode::Starting),
            session_state: parking_lot::RwLock::new(None),
            last_error: parking_lot::RwLock::new(None),
            last_published_at: parking_lot::RwLock::new(None),
            ticks_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    /// Set the running feed mode.
    pub fn set_mode(&self, mode: FeedMode) {
        *self.mode.write() = mode;
        if mode != FeedMode::Live {
            *self.session_state.write() = None;
        }
    }

    /// Get the running feed mode.
    #[must_use]
    pub fn mode(&self) -> FeedMode {
        *self.mode.read()
    }

    /// Record the live session state.
    pub fn set_session_state(&self, state: SessionState) {
        *self.session_state.write() = Some(state);
    }

    /// Get the live session state, if a live session exists.
    #[must_use]
    pub fn session_state(&self) -> Option<SessionState> {
        *self.session_state.read()
    }

    /// Record the latest error.
    pub fn set_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    /// Get the latest error.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Record a successful publish.
    pub fn record_published(&self, at: DateTime<Utc>) {
        self.ticks_published.fetch_add(1, Ordering::Relaxed);
        *self.last_published_at.write() = Some(at);
    }

    /// Record a failed publish.
    pub fn record_publish_failure(&self, message: String) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
        self.set_error(message);
    }

    /// Record an inbound event dropped by the normalizer.
    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment reconnect attempts.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Clear reconnect attempts once a live session has delivered ticks.
    pub fn reset_reconnect_attempts(&self) {
        self.reconnect_attempts.store(0, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot for reporting.
    #[must_use]
    pub fn snapshot(&self) -> FeedStatusSnapshot {
        FeedStatusSnapshot {
            mode: self.mode(),
            session_state: self.session_state().map(|s| s.as_str()),
            last_error: self.last_error(),
            last_published_at: *self.last_published_at.read(),
            ticks_published: self.ticks_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FeedStatus`].
#[derive(Debug, Clone, Serialize)]
pub struct FeedStatusSnapshot {
    /// Running feed mode.
    pub mode: FeedMode,
    /// Live session state, if any.
    pub session_state: Option<&'static str>,
    /// Latest error message.
    pub last_error: Option<String>,
    /// Time of the last successful publish.
    pub last_published_at: Option<DateTime<Utc>>,
    /// Ticks written to the store.
    pub ticks_published: u64,
    /// Store writes that failed.
    pub publish_failures: u64,
    /// Inbound events dropped by the normalizer.
    pub messages_dropped: u64,
    /// Reconnect attempts since the last streaming session.
    pub reconnect_attempts: u32,
}
