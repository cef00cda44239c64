//! Tick Store Adapters
//!
//! Implementations of the [`TickStore`](crate::application::ports::TickStore)
//! port.
//!
//! - **Redis**: production store shared with downstream readers
//! - **Memory**: in-process store for local runs and tests
//!
//! # Key Layout
//!
//! - `latest:{SYMBOL}` → JSON tick payload
//! - `ticks:{SYMBOL}` → list of JSON tick payloads, most recent first

mod memory;
mod redis_store;

use std::sync::Arc;

pub use memory::MemoryTickStore;
pub use redis_store::RedisTickStore;

use crate::application::ports::{SharedTickStore, StoreError};

/// URL scheme selecting the in-process store.
pub const MEMORY_SCHEME: &str = "memory://";

/// Key holding the latest tick for `symbol`.
#[must_use]
pub fn latest_key(symbol: &str) -> String {
    format!("latest:{}", symbol.trim().to_uppercase())
}

/// Key holding the recent-ticks list for `symbol`.
#[must_use]
pub fn recent_key(symbol: &str) -> String {
    format!("ticks:{}", symbol.trim().to_uppercase())
}

/// Open the store named by `url`.
///
/// `memory://` selects [`MemoryTickStore`]; anything else is handed to
/// [`RedisTickStore::open`]. No connection is made here.
///
/// # Errors
///
/// Returns [`StoreError::Unavailable`] if the Redis URL cannot be parsed.
pub fn open(url: &str) -> Result<SharedTickStore, StoreError> {
    if url.starts_with(MEMORY_SCHEME) {
        return Ok(Arc::new(MemoryTickStore::new()));
    }
    Ok(Arc::new(RedisTickStore::open(url)?))
}
