//! Configuration Module
//!
//! Environment-driven configuration for the worker. No feed component reads
//! the environment itself; everything flows from [`WorkerConfig`].

mod settings;

pub use settings::{
    ConfigError, DEFAULT_REDIS_URL, DEFAULT_WATCHLIST, ServerSettings, WorkerConfig,
};
