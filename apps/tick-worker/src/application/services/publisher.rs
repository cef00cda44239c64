//! Tick Publisher
//!
//! Fans a normalized tick out to the store: overwrite `latest:{SYMBOL}`,
//! then prepend to the bounded `ticks:{SYMBOL}` window.
//!
//! Store failures are contained here. They are logged, counted and the tick
//! is dropped; the next successful publish restores consistency. Nothing on
//! this path can stop the ingestion loop.

use std::sync::Arc;
use std::time::Instant;

use crate::application::ports::{SharedTickStore, StoreError};
use crate::application::services::status::FeedStatus;
use crate::domain::tick::Tick;
use crate::infrastructure::metrics::{self, FeedKind};

/// Default recent-window capacity.
pub const DEFAULT_RECENT_CAPACITY: usize = 200;

/// Publishes ticks to a [`TickStore`](crate::application::ports::TickStore).
#[derive(Clone)]
pub struct TickPublisher {
    store: SharedTickStore,
    capacity: usize,
    status: Arc<FeedStatus>,
}

impl TickPublisher {
    /// Create a publisher writing windows of at most `capacity` ticks.
    #[must_use]
    pub fn new(store: SharedTickStore, capacity: usize, status: Arc<FeedStatus>) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            status,
        }
    }

    /// Recent-window capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &SharedTickStore {
        &self.store
    }

    /// Publish one tick.
    ///
    /// Returns `true` if both writes succeeded. Failures are logged and
    /// swallowed.
    pub async fn publish(&self, tick: &Tick, feed: FeedKind) -> bool {
        let started = Instant::now();

        match self.try_publish(tick).await {
            Ok(()) => {
                metrics::record_tick_published(feed);
                metrics::record_publish_duration(feed, started.elapsed());
                self.status.record_published(tick.timestamp());
                tracing::trace!(
                    symbol = tick.symbol(),
                    price = %tick.price(),
                    size = tick.size(),
                    "Tick published"
                );
                true
            }
            Err(e) => {
                let error_type = if e.is_unavailable() {
                    "unavailable"
                } else {
                    "codec"
                };
                metrics::record_publish_failure(feed, error_type);
                tracing::warn!(
                    symbol = tick.symbol(),
                    feed = feed.as_str(),
                    error = %e,
                    "Failed to publish tick, dropping"
                );
                self.status.record_publish_failure(e.to_string());
                false
            }
        }
    }

    async fn try_publish(&self, tick: &Tick) -> Result<(), StoreError> {
        let symbol = tick.symbol();
        self.store.publish_latest(symbol, tick).await?;
        self.store.append_recent(symbol, tick, self.capacity).await
    }
}

impl std::fmt::Debug for TickPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickPublisher")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
