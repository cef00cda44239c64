//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `TickPublisher`: writes normalized ticks through the store port
//! - `FeedStatus`: shared view of the running feed for health reporting
//! - `FeedSupervisor`: selects the feed and owns live-to-simulated fallback

pub mod publisher;
pub mod status;
pub mod supervisor;

pub use publisher::{DEFAULT_RECENT_CAPACITY, TickPublisher};
pub use status::{FeedMode, FeedStatus, FeedStatusSnapshot};
pub use supervisor::{FeedSupervisor, SupervisorConfig};
