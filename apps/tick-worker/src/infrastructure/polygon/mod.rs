//! Polygon Live Feed
//!
//! WebSocket client for the Polygon.io stocks stream.
//!
//! # Components
//!
//! - **Client**: session lifecycle (connect, auth, subscribe, stream)
//! - **Normalizer**: raw trade events to canonical ticks
//! - **Codec**: frame splitting
//! - **Heartbeat**: idle detection
//! - **Reconnect**: bounded backoff used by the supervisor between sessions

pub mod auth;
pub mod client;
pub mod codec;
pub mod heartbeat;
pub mod messages;
pub mod normalize;
pub mod reconnect;

pub use auth::{ApiKey, AuthError};
pub use client::{
    DEFAULT_POLYGON_WS_URL, LiveFeedConfig, LiveFeedError, PolygonClient, SessionOutcome,
    SessionReport,
};
pub use heartbeat::HeartbeatConfig;
pub use normalize::{DropReason, normalize, normalize_batch};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
