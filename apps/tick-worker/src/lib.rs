#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Tick Worker - Market Tick Ingestion
//!
//! Ingests trade ticks for a configured watchlist and publishes them into a
//! shared store: the latest tick per symbol under `latest:{SYMBOL}` and a
//! bounded, most-recent-first window under `ticks:{SYMBOL}`.
//!
//! Ticks come from the Polygon stocks WebSocket when an API key is
//! configured, otherwise from a seeded random walk. A live feed that cannot
//! be kept up is replaced by the simulated feed for the rest of the process.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `tick`: Canonical trade tick and its JSON shape
//!   - `watchlist`: Configured symbol set
//!   - `session`: Live session state machine
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Tick store interface
//!   - `services`: Publisher, feed status, feed supervisor
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `polygon`: Live WebSocket client and normalizer
//!   - `simulator`: Seeded random-walk feed
//!   - `store`: Redis and in-memory tick stores
//!   - `config`: Environment configuration
//!   - `health`: Health, metrics and read-back HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! Polygon WS ──(normalize)──┐
//!                           ├──► TickPublisher ──► latest:{SYMBOL}
//! Random walk ──────────────┘                  └─► ticks:{SYMBOL}
//!        ▲
//!        └── FeedSupervisor (live, or simulated, or live then fallback)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core tick types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::session::{FeedSession, SessionError, SessionState};
pub use domain::tick::{EventType, Tick, TickError};
pub use domain::watchlist::{Watchlist, WatchlistError};

// Ports and services
pub use application::ports::{SharedTickStore, StoreError, TickStore};
pub use application::services::{
    FeedMode, FeedStatus, FeedStatusSnapshot, FeedSupervisor, SupervisorConfig, TickPublisher,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, ServerSettings, WorkerConfig};

// Feeds
pub use infrastructure::polygon::{
    LiveFeedConfig, LiveFeedError, PolygonClient, ReconnectConfig, SessionOutcome,
};
pub use infrastructure::simulator::{SimulatedFeed, SimulatorConfig};

// Stores
pub use infrastructure::store::{MemoryTickStore, RedisTickStore};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::{FeedKind as MetricsFeedKind, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
