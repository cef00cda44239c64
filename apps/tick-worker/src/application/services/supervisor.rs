//! Feed Supervisor
//!
//! Chooses and runs the feed:
//!
//! 1. No credential: run the simulated feed.
//! 2. Credential: run live sessions, backing off between them with a
//!    bounded [`ReconnectPolicy`]. A rejected or malformed credential is not
//!    retried. When the budget is spent, fall back to the simulated feed for
//!    the rest of the process lifetime.
//!
//! Exactly one feed runs at a time and fallback never reverses.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::services::publisher::TickPublisher;
use crate::application::services::status::{FeedMode, FeedStatus};
use crate::domain::watchlist::Watchlist;
use crate::infrastructure::metrics::{self, FeedKind};
use crate::infrastructure::polygon::{
    LiveFeedConfig, PolygonClient, ReconnectConfig, ReconnectPolicy, SessionOutcome,
};
use crate::infrastructure::simulator::{SimulatedFeed, SimulatorConfig};

/// Supervisor configuration.
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    /// Live feed settings; `None` selects the simulated feed.
    pub live: Option<LiveFeedConfig>,
    /// Backoff between live sessions.
    pub reconnect: ReconnectConfig,
    /// Simulated feed settings.
    pub simulator: SimulatorConfig,
}

/// How the live phase ended.
enum LiveExit {
    Cancelled,
    GaveUp,
}

/// Runs the live feed, the simulated feed, or one then the other.
pub struct FeedSupervisor {
    config: SupervisorConfig,
    watchlist: Arc<Watchlist>,
    publisher: TickPublisher,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
}

impl FeedSupervisor {
    /// Create a supervisor.
    #[must_use]
    pub const fn new(
        config: SupervisorConfig,
        watchlist: Arc<Watchlist>,
        publisher: TickPublisher,
        status: Arc<FeedStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            watchlist,
            publisher,
            status,
            cancel,
        }
    }

    /// Run until cancelled.
    pub async fn run(mut self) {
        let mode = match self.config.live.take() {
            None => {
                tracing::info!("No provider credential configured, using simulated feed");
                FeedMode::Simulated
            }
            Some(live) => match self.run_live(live).await {
                LiveExit::Cancelled => return,
                LiveExit::GaveUp => {
                    tracing::warn!("Live feed unavailable, falling back to simulated feed");
                    FeedMode::Fallback
                }
            },
        };

        self.run_simulated(mode).await;
    }

    async fn run_live(&self, live: LiveFeedConfig) -> LiveExit {
        self.status.set_mode(FeedMode::Live);
        metrics::set_active_feed(FeedKind::Live);

        let client = match PolygonClient::new(
            live,
            Arc::clone(&self.watchlist),
            self.publisher.clone(),
            Arc::clone(&self.status),
            self.cancel.clone(),
        ) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "Cannot start live feed");
                self.status.set_error(e.to_string());
                return LiveExit::GaveUp;
            }
        };

        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
        let mut attempt = 0;

        loop {
            let report = client.run_session(attempt).await;

            // A session that subscribes and then drops without delivering
            // anything still spends the budget.
            if report.ticks_published > 0 {
                policy.reset();
                self.status.reset_reconnect_attempts();
            }

            match report.outcome {
                SessionOutcome::Cancelled => return LiveExit::Cancelled,
                SessionOutcome::Closed => {
                    self.status.set_error("live session closed by provider".to_string());
                }
                SessionOutcome::Failed(e) => {
                    self.status.set_error(e.to_string());
                    if !e.is_retryable() {
                        tracing::error!(error = %e, "Live feed failed permanently");
                        return LiveExit::GaveUp;
                    }
                }
            }

            let Some(delay) = policy.next_delay() else {
                tracing::warn!(
                    attempts = policy.attempt_count(),
                    "Live feed reconnect attempts exhausted"
                );
                return LiveExit::GaveUp;
            };

            attempt += 1;
            metrics::record_reconnect();
            self.status.increment_reconnect_attempts();
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis(),
                "Reconnecting to live feed"
            );

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Supervisor cancelled during reconnect delay");
                    return LiveExit::Cancelled;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn run_simulated(&self, mode: FeedMode) {
        self.status.set_mode(mode);
        metrics::set_active_feed(FeedKind::Simulated);

        SimulatedFeed::new(&self.watchlist, &self.config.simulator, self.publisher.clone())
            .run(self.cancel.clone())
            .await;
    }
}

impl std::fmt::Debug for FeedSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSupervisor")
            .field("config", &self.config)
            .field("watchlist", &self.watchlist.symbols())
            .finish_non_exhaustive()
    }
}
