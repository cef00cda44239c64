//! Simulated Feed
//!
//! Generates a random-walk trade per watchlist symbol on a fixed cadence.
//! Used when no provider credential is configured and as the fallback once
//! the live feed has given up.
//!
//! Each symbol owns its [`PriceWalk`] and RNG. With a fixed seed, the
//! per-symbol seeds are drawn from one master RNG in watchlist order, so a
//! run is reproducible and no symbol's sequence depends on another's.

use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tokio_util::sync::CancellationToken;

use crate::application::services::publisher::TickPublisher;
use crate::domain::tick::Tick;
use crate::domain::watchlist::Watchlist;
use crate::infrastructure::metrics::FeedKind;

/// Default tick cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Smallest publishable price.
const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum relative move per round.
const MAX_STEP: f64 = 0.01;

/// Simulator configuration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Time between rounds.
    pub interval: Duration,
    /// Fixed seed for reproducible runs; OS entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TICK_INTERVAL,
            seed: None,
        }
    }
}

// =============================================================================
// Price Walk
// =============================================================================

/// Random walk for one symbol.
#[derive(Debug)]
pub struct PriceWalk {
    symbol: String,
    price: f64,
    rng: StdRng,
}

impl PriceWalk {
    /// Start a walk at a uniform price in `[100, 200)`.
    #[must_use]
    pub fn new(symbol: impl Into<String>, mut rng: StdRng) -> Self {
        let price = rng.random_range(100.0..200.0);
        Self {
            symbol: symbol.into(),
            price,
            rng,
        }
    }

    /// Symbol this walk prices.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Advance one step and return the published `(price, size)`.
    ///
    /// The running price keeps full precision; only the published value is
    /// rounded to cents.
    pub fn step(&mut self) -> (Decimal, u64) {
        let change = self.rng.random_range(-MAX_STEP..=MAX_STEP);
        self.price *= 1.0 + change;
        let size = self.rng.random_range(1..=100);

        let price = Decimal::from_f64(self.price)
            .unwrap_or(MIN_PRICE)
            .round_dp(2)
            .max(MIN_PRICE);
        (price, size)
    }
}

// =============================================================================
// Simulated Feed
// =============================================================================

/// Simulated feed publishing one tick per symbol per round.
pub struct SimulatedFeed {
    walks: Vec<PriceWalk>,
    interval: Duration,
    publisher: TickPublisher,
}

impl SimulatedFeed {
    /// Build walks for every symbol of `watchlist`.
    #[must_use]
    pub fn new(watchlist: &Watchlist, config: &SimulatorConfig, publisher: TickPublisher) -> Self {
        let mut master = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let walks = watchlist
            .iter()
            .map(|symbol| PriceWalk::new(symbol, StdRng::seed_from_u64(master.random())))
            .collect();

        Self {
            walks,
            interval: config.interval,
            publisher,
        }
    }

    /// Generate the next round of ticks, one per symbol in watchlist order.
    pub fn next_round(&mut self) -> Vec<Tick> {
        let now = Utc::now();
        self.walks
            .iter_mut()
            .filter_map(|walk| {
                let (price, size) = walk.step();
                match Tick::trade(walk.symbol(), price, size, now) {
                    Ok(tick) => Some(tick),
                    Err(e) => {
                        tracing::warn!(symbol = walk.symbol(), error = %e, "Skipping simulated tick");
                        None
                    }
                }
            })
            .collect()
    }

    /// Publish rounds until cancelled. The first round is published
    /// immediately.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            symbols = self.walks.len(),
            interval_ms = self.interval.as_millis(),
            "Simulated feed started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Simulated feed stopped");
                    return;
                }
                _ = interval.tick() => {
                    for tick in self.next_round() {
                        self.publisher.publish(&tick, FeedKind::Simulated).await;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for SimulatedFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedFeed")
            .field("symbols", &self.walks.len())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::application::ports::TickStore;
    use crate::application::services::status::FeedStatus;
    use crate::infrastructure::store::MemoryTickStore;

    fn feed(seed: Option<u64>, symbols: &str) -> (SimulatedFeed, Arc<MemoryTickStore>) {
        let store = Arc::new(MemoryTickStore::new());
        let publisher = TickPublisher::new(store.clone(), 200, Arc::new(FeedStatus::new()));
        let config = SimulatorConfig {
            interval: Duration::from_millis(10),
            seed,
        };
        let feed = SimulatedFeed::new(&Watchlist::parse(symbols).unwrap(), &config, publisher);
        (feed, store)
    }

    fn prices(feed: &mut SimulatedFeed, rounds: usize) -> Vec<Vec<(String, Decimal, u64)>> {
        (0..rounds)
            .map(|_| {
                feed.next_round()
                    .into_iter()
                    .map(|t| (t.symbol().to_string(), t.price(), t.size()))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn same_seed_reproduces_sequence() {
        let (mut a, _) = feed(Some(42), "AAPL,MSFT,TSLA");
        let (mut b, _) = feed(Some(42), "AAPL,MSFT,TSLA");
        assert_eq!(prices(&mut a, 50), prices(&mut b, 50));
    }

    #[test]
    fn different_seeds_diverge() {
        let (mut a, _) = feed(Some(1), "AAPL");
        let (mut b, _) = feed(Some(2), "AAPL");
        assert_ne!(prices(&mut a, 5), prices(&mut b, 5));
    }

    #[test]
    fn rounds_follow_watchlist_order() {
        let (mut feed, _) = feed(None, "TSLA,AAPL,RELIANCE.NS");
        let symbols: Vec<_> = feed.next_round().iter().map(|t| t.symbol().to_string()).collect();
        assert_eq!(symbols, ["TSLA", "AAPL", "RELIANCE.NS"]);
    }

    #[test]
    fn walk_stays_within_step_bounds() {
        let mut walk = PriceWalk::new("AAPL", StdRng::seed_from_u64(7));
        assert!((100.0..200.0).contains(&walk.price));

        for _ in 0..1000 {
            let before = walk.price;
            let (price, size) = walk.step();
            assert!(walk.price >= before * (1.0 - MAX_STEP) - 1e-9);
            assert!(walk.price <= before * (1.0 + MAX_STEP) + 1e-9);
            assert!(price >= MIN_PRICE);
            assert_eq!(price, price.round_dp(2));
            assert!((1..=100).contains(&size));
        }
    }

    #[test]
    fn tiny_prices_floor_at_one_cent() {
        let mut walk = PriceWalk::new("PENNY", StdRng::seed_from_u64(3));
        walk.price = 0.000_1;
        let (price, _) = walk.step();
        assert_eq!(price, MIN_PRICE);
    }

    #[tokio::test]
    async fn run_publishes_first_round_immediately() {
        let (feed, store) = feed(Some(9), "AAPL,MSFT");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(feed.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(store.read_latest("AAPL").await.unwrap().is_some());
        assert!(!store.read_recent("MSFT", 200).await.unwrap().is_empty());
    }
}
