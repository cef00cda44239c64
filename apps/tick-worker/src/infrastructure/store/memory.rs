//! In-Process Tick Store
//!
//! Holds latest ticks and recent windows in memory behind a single mutex,
//! so append-and-truncate is atomic per symbol. Selected with a `memory://`
//! store URL.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::application::ports::{StoreError, TickStore};
use crate::domain::tick::Tick;

#[derive(Debug, Default)]
struct MemoryState {
    latest: HashMap<String, Tick>,
    recent: HashMap<String, VecDeque<Tick>>,
}

/// In-memory [`TickStore`].
#[derive(Debug)]
pub struct MemoryTickStore {
    state: Mutex<MemoryState>,
    available: AtomicBool,
}

impl Default for MemoryTickStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTickStore {
    /// Create an empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        }
    }
}

fn key(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[async_trait]
impl TickStore for MemoryTickStore {
    async fn publish_latest(&self, symbol: &str, tick: &Tick) -> Result<(), StoreError> {
        self.check_available()?;
        self.state.lock().latest.insert(key(symbol), tick.clone());
        Ok(())
    }

    async fn append_recent(
        &self,
        symbol: &str,
        tick: &Tick,
        capacity: usize,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let window = state.recent.entry(key(symbol)).or_default();
        window.push_front(tick.clone());
        window.truncate(capacity);
        Ok(())
    }

    async fn read_latest(&self, symbol: &str) -> Result<Option<Tick>, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().latest.get(&key(symbol)).cloned())
    }

    async fn read_recent(&self, symbol: &str, limit: usize) -> Result<Vec<Tick>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .recent
            .get(&key(symbol))
            .map(|window| window.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn tick(symbol: &str, seq: i64) -> Tick {
        Tick::trade(
            symbol,
            Decimal::new(10_000 + seq, 2),
            1,
            Utc.timestamp_opt(seq, 0).unwrap(),
        )
        .unwrap()
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn read_missing_symbol_is_absent() {
        let store = MemoryTickStore::new();
        assert!(store.read_latest("AAPL").await.unwrap().is_none());
        assert!(store.read_recent("AAPL", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_latest_is_idempotent() {
        let store = MemoryTickStore::new();
        let t = tick("AAPL", 1);

        store.publish_latest("AAPL", &t).await.unwrap();
        store.publish_latest("AAPL", &t).await.unwrap();

        assert_eq!(store.read_latest("aapl").await.unwrap(), Some(t));
    }

    #[tokio::test]
    async fn read_recent_respects_limit() {
        let store = MemoryTickStore::new();
        for seq in 0..5 {
            store.append_recent("MSFT", &tick("MSFT", seq), 10).await.unwrap();
        }

        let recent = store.read_recent("MSFT", 2).await.unwrap();
        assert_eq!(recent, vec![tick("MSFT", 4), tick("MSFT", 3)]);
        assert!(store.read_recent("MSFT", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryTickStore::new();
        store.set_available(false);

        let err = store.publish_latest("AAPL", &tick("AAPL", 1)).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(store.ping().await.is_err());

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_appends_never_exceed_capacity() {
        let store = std::sync::Arc::new(MemoryTickStore::new());
        let mut handles = Vec::new();

        for seq in 0..64 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append_recent("TSLA", &tick("TSLA", seq), 16).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.read_recent("TSLA", 100).await.unwrap().len(), 16);
    }

    proptest! {
        #[test]
        fn window_keeps_most_recent_first(appends in 0usize..300, capacity in 1usize..250) {
            let store = MemoryTickStore::new();
            let recent = runtime().block_on(async {
                for seq in 0..appends {
                    let seq = i64::try_from(seq).unwrap();
                    store.append_recent("AAPL", &tick("AAPL", seq), capacity).await.unwrap();
                }
                store.read_recent("AAPL", usize::MAX).await.unwrap()
            });

            prop_assert_eq!(recent.len(), appends.min(capacity));
            let expected: Vec<Tick> = (0..appends)
                .rev()
                .take(capacity)
                .map(|seq| tick("AAPL", i64::try_from(seq).unwrap()))
                .collect();
            prop_assert_eq!(recent, expected);
        }
    }
}
