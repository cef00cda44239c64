//! Prometheus Metrics Module
//!
//! Exposes worker metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Publishing**: ticks written to the store and failed writes
//! - **Ingestion**: inbound messages dropped by the normalizer
//! - **Sessions**: live feed session outcomes and reconnect attempts
//! - **Mode**: which feed is currently active
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "tick_worker_ticks_published_total",
        "Ticks successfully written to the store"
    );
    describe_counter!(
        "tick_worker_publish_failures_total",
        "Tick writes that failed and were dropped"
    );
    describe_counter!(
        "tick_worker_messages_dropped_total",
        "Inbound provider events dropped by the normalizer"
    );
    describe_counter!(
        "tick_worker_live_sessions_total",
        "Live feed sessions by final outcome"
    );
    describe_counter!(
        "tick_worker_reconnects_total",
        "Live feed reconnection attempts"
    );
    describe_gauge!(
        "tick_worker_feed_active",
        "1 for the feed currently running, 0 otherwise"
    );
    describe_histogram!(
        "tick_worker_publish_seconds",
        "Time to write one tick to the store"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for feed kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Provider WebSocket feed.
    Live,
    /// Synthetic random-walk feed.
    Simulated,
}

impl FeedKind {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Simulated => "simulated",
        }
    }
}

/// Record a tick written to the store.
pub fn record_tick_published(feed: FeedKind) {
    counter!("tick_worker_ticks_published_total", "feed" => feed.as_str()).increment(1);
}

/// Record a failed store write.
pub fn record_publish_failure(feed: FeedKind, error_type: &'static str) {
    counter!(
        "tick_worker_publish_failures_total",
        "feed" => feed.as_str(),
        "error_type" => error_type
    )
    .increment(1);
}

/// Record an inbound event dropped by the normalizer.
pub fn record_message_dropped(reason: &'static str) {
    counter!("tick_worker_messages_dropped_total", "reason" => reason).increment(1);
}

/// Record how a live session ended.
pub fn record_session_end(outcome: &'static str) {
    counter!("tick_worker_live_sessions_total", "outcome" => outcome).increment(1);
}

/// Record a live reconnection attempt.
pub fn record_reconnect() {
    counter!("tick_worker_reconnects_total").increment(1);
}

/// Mark which feed is running.
pub fn set_active_feed(feed: FeedKind) {
    for kind in [FeedKind::Live, FeedKind::Simulated] {
        let value = if kind == feed { 1.0 } else { 0.0 };
        gauge!("tick_worker_feed_active", "feed" => kind.as_str()).set(value);
    }
}

/// Record store write latency.
pub fn record_publish_duration(feed: FeedKind, duration: Duration) {
    histogram!("tick_worker_publish_seconds", "feed" => feed.as_str())
        .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
