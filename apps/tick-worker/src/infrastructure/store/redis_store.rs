//! Redis Tick Store
//!
//! Publishes ticks to Redis using the shared key layout. The connection is
//! established lazily on first use and cached as a
//! [`ConnectionManager`], which reconnects on its own after failures. A
//! Redis instance that is down at startup therefore only costs the ticks
//! published while it is down.
//!
//! Every connection attempt is a single try bounded by [`CONNECT_TIMEOUT`].
//! After a failed attempt, calls fail immediately for [`RETRY_COOLDOWN`]
//! so an outage never holds up the feed loop.
//!
//! `append_recent` runs `LPUSH` + `LTRIM` inside `MULTI`/`EXEC`, so
//! concurrent workers appending to the same symbol cannot interleave
//! between push and trim.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::sync::Mutex;

use super::{latest_key, recent_key};
use crate::application::ports::{StoreError, TickStore};
use crate::domain::tick::Tick;

/// Time allowed to establish a connection before a call fails.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Time allowed for a command response.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Quiet period after a failed connection attempt.
const RETRY_COOLDOWN: Duration = Duration::from_secs(1);

/// Redis-backed [`TickStore`].
pub struct RedisTickStore {
    client: redis::Client,
    connection: Mutex<Option<ConnectionManager>>,
    retry_after: parking_lot::Mutex<Option<Instant>>,
}

impl RedisTickStore {
    /// Create a store for `url` without connecting.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL cannot be parsed.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            retry_after: parking_lot::Mutex::new(None),
        })
    }

    fn manager_config() -> ConnectionManagerConfig {
        ConnectionManagerConfig::new()
            .set_number_of_retries(0)
            .set_connection_timeout(CONNECT_TIMEOUT)
            .set_response_timeout(RESPONSE_TIMEOUT)
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        if let Some(at) = *self.retry_after.lock()
            && Instant::now() < at
        {
            return Err(StoreError::Unavailable(
                "connection failed recently, waiting before retry".to_string(),
            ));
        }

        let attempt = ConnectionManager::new_with_config(self.client.clone(), Self::manager_config());
        let result = match tokio::time::timeout(CONNECT_TIMEOUT, attempt).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(unavailable(e)),
            Err(_) => Err(StoreError::Unavailable("connection timed out".to_string())),
        };

        match result {
            Ok(conn) => {
                tracing::info!("Connected to Redis");
                *self.retry_after.lock() = None;
                *guard = Some(conn.clone());
                Ok(conn)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    cooldown_ms = RETRY_COOLDOWN.as_millis(),
                    "Redis connection failed"
                );
                *self.retry_after.lock() = Some(Instant::now() + RETRY_COOLDOWN);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for RedisTickStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTickStore").finish_non_exhaustive()
    }
}

fn unavailable(err: redis::RedisError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// `LTRIM` bounds keeping the first `capacity` entries.
///
/// A zero capacity maps to an inverted range, which empties the list.
fn trim_range(capacity: usize) -> (isize, isize) {
    if capacity == 0 {
        (1, 0)
    } else {
        (0, isize::try_from(capacity - 1).unwrap_or(isize::MAX))
    }
}

fn decode_recent(key: &str, payloads: Vec<String>) -> Vec<Tick> {
    payloads
        .into_iter()
        .filter_map(|payload| match Tick::from_json(&payload) {
            Ok(tick) => Some(tick),
            Err(e) => {
                tracing::warn!(key, error = %e, "Skipping undecodable tick payload");
                None
            }
        })
        .collect()
}

#[async_trait]
impl TickStore for RedisTickStore {
    async fn publish_latest(&self, symbol: &str, tick: &Tick) -> Result<(), StoreError> {
        let payload = tick.to_json()?;
        let mut conn = self.connection().await?;
        let () = conn
            .set(latest_key(symbol), payload)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn append_recent(
        &self,
        symbol: &str,
        tick: &Tick,
        capacity: usize,
    ) -> Result<(), StoreError> {
        let payload = tick.to_json()?;
        let key = recent_key(symbol);
        let (start, stop) = trim_range(capacity);
        let mut conn = self.connection().await?;

        let () = redis::pipe()
            .atomic()
            .lpush(&key, payload)
            .ignore()
            .ltrim(&key, start, stop)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn read_latest(&self, symbol: &str) -> Result<Option<Tick>, StoreError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(latest_key(symbol)).await.map_err(unavailable)?;

        payload
            .map(|p| Tick::from_json(&p))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn read_recent(&self, symbol: &str, limit: usize) -> Result<Vec<Tick>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let key = recent_key(symbol);
        let (start, stop) = trim_range(limit);
        let mut conn = self.connection().await?;
        let payloads: Vec<String> = conn
            .lrange(&key, start, stop)
            .await
            .map_err(unavailable)?;

        Ok(decode_recent(&key, payloads))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_range_keeps_capacity_entries() {
        assert_eq!(trim_range(200), (0, 199));
        assert_eq!(trim_range(1), (0, 0));
        assert_eq!(trim_range(0), (1, 0));
    }

    #[test]
    fn open_accepts_redis_urls() {
        assert!(RedisTickStore::open("redis://127.0.0.1:6379/0").is_ok());
        assert!(RedisTickStore::open("redis://redis:6379").is_ok());
    }

    #[test]
    fn decode_recent_skips_bad_payloads() {
        let good = r#"{"symbol":"AAPL","price":101.5,"size":3,"ts":"2024-01-15T14:30:00Z","type":"trade"}"#;
        let ticks = decode_recent(
            "ticks:AAPL",
            vec![good.to_string(), "not json".to_string(), good.to_string()],
        );
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].symbol(), "AAPL");
    }

    #[tokio::test]
    async fn unreachable_redis_reports_unavailable() {
        let store = RedisTickStore::open("redis://127.0.0.1:1/0").unwrap();
        let err = store.ping().await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn outage_fails_fast_instead_of_stalling_publishes() {
        let store = RedisTickStore::open("redis://127.0.0.1:1/0").unwrap();
        let tick = Tick::trade(
            "AAPL",
            rust_decimal::Decimal::new(18942, 2),
            100,
            chrono::Utc::now(),
        )
        .unwrap();

        let started = Instant::now();
        for _ in 0..5 {
            let err = store.publish_latest("AAPL", &tick).await.unwrap_err();
            assert!(err.is_unavailable());
        }
        assert!(started.elapsed() < RETRY_COOLDOWN);

        let err = store.append_recent("AAPL", &tick, 10).await.unwrap_err();
        assert!(err.to_string().contains("waiting before retry"));
    }
}
