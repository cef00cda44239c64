//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. Infrastructure adapters implement
//! these contracts.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TickStore`: latest-tick entries and bounded recent windows per symbol

use async_trait::async_trait;

use crate::domain::tick::Tick;

// =============================================================================
// Store Errors
// =============================================================================

/// Errors surfaced by a [`TickStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the command.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored payload could not be encoded or decoded.
    #[error("store codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if this error means the store itself is unreachable.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

// =============================================================================
// Tick Store Port
// =============================================================================

/// Key-value + bounded-list store for publishing ticks.
///
/// Implementations own no business logic. Writes become visible to
/// subsequent reads once the call returns.
#[async_trait]
pub trait TickStore: Send + Sync {
    /// Overwrite the latest-tick entry for `symbol`.
    async fn publish_latest(&self, symbol: &str, tick: &Tick) -> Result<(), StoreError>;

    /// Prepend `tick` to the recent window for `symbol` and truncate it to
    /// `capacity` entries.
    ///
    /// Must be atomic with respect to concurrent appends for the same
    /// symbol: no entry is lost and the window never exceeds `capacity`.
    async fn append_recent(
        &self,
        symbol: &str,
        tick: &Tick,
        capacity: usize,
    ) -> Result<(), StoreError>;

    /// Read the latest tick for `symbol`, if any.
    async fn read_latest(&self, symbol: &str) -> Result<Option<Tick>, StoreError>;

    /// Read up to `limit` recent ticks for `symbol`, most recent first.
    async fn read_recent(&self, symbol: &str, limit: usize) -> Result<Vec<Tick>, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Shared handle to a tick store.
pub type SharedTickStore = std::sync::Arc<dyn TickStore>;
