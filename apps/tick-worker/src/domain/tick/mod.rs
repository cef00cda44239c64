//! Tick Types
//!
//! The canonical trade observation published by the worker. Every feed
//! (live or simulated) produces `Tick` values; the store only ever sees
//! this shape.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {
//!   "symbol": "AAPL",
//!   "price": 189.42,
//!   "size": 100,
//!   "ts": "2024-01-15T14:30:00.123456Z",
//!   "type": "trade"
//! }
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Error Type
// =============================================================================

/// Errors raised when constructing a [`Tick`] from invalid parts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickError {
    /// Symbol was empty after trimming.
    #[error("symbol cannot be empty")]
    EmptySymbol,

    /// Price was zero or negative.
    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    /// Size was zero.
    #[error("size must be positive")]
    ZeroSize,
}

// =============================================================================
// Event Type
// =============================================================================

/// Kind of market event a tick represents.
///
/// Only trades are modeled. The `"T"` alias accepts payloads written with
/// the provider's single-letter tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Executed trade.
    #[default]
    #[serde(alias = "T")]
    Trade,
}

impl EventType {
    /// Get the event type name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trade => "trade",
        }
    }
}

// =============================================================================
// Tick
// =============================================================================

/// A single normalized trade observation for one instrument.
///
/// Fields are private: a tick is immutable once built, and every
/// constructor path (including deserialization) validates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TickRecord", into = "TickRecord")]
pub struct Tick {
    symbol: String,
    price: Decimal,
    size: u64,
    timestamp: DateTime<Utc>,
    event_type: EventType,
}

impl Tick {
    /// Build a trade tick.
    ///
    /// The symbol is trimmed and upper-cased.
    ///
    /// # Errors
    ///
    /// Returns [`TickError`] if the symbol is empty, the price is not
    /// positive, or the size is zero.
    pub fn trade(
        symbol: &str,
        price: Decimal,
        size: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, TickError> {
        Self::new(symbol, price, size, timestamp, EventType::Trade)
    }

    fn new(
        symbol: &str,
        price: Decimal,
        size: u64,
        timestamp: DateTime<Utc>,
        event_type: EventType,
    ) -> Result<Self, TickError> {
        let symbol = normalize_symbol(symbol).ok_or(TickError::EmptySymbol)?;
        if price <= Decimal::ZERO {
            return Err(TickError::NonPositivePrice(price));
        }
        if size == 0 {
            return Err(TickError::ZeroSize);
        }

        Ok(Self {
            symbol,
            price,
            size,
            timestamp,
            event_type,
        })
    }

    /// Instrument symbol (uppercase).
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Trade price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Trade size.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Observation time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Event type tag.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Serialize to the JSON payload stored under `latest:` and `ticks:`.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a stored JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid JSON or violates a
    /// tick invariant.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Trim and upper-case a symbol, returning `None` if nothing is left.
#[must_use]
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

// =============================================================================
// Wire Record
// =============================================================================

#[derive(Serialize, Deserialize)]
struct TickRecord {
    symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    size: u64,
    #[serde(with = "iso_utc")]
    ts: DateTime<Utc>,
    #[serde(rename = "type", default)]
    event_type: EventType,
}

impl TryFrom<TickRecord> for Tick {
    type Error = TickError;

    fn try_from(record: TickRecord) -> Result<Self, Self::Error> {
        Self::new(
            &record.symbol,
            record.price,
            record.size,
            record.ts,
            record.event_type,
        )
    }
}

impl From<Tick> for TickRecord {
    fn from(tick: Tick) -> Self {
        Self {
            symbol: tick.symbol,
            price: tick.price,
            size: tick.size,
            ts: tick.timestamp,
            event_type: tick.event_type,
        }
    }
}

/// ISO-8601 UTC timestamps with a trailing `Z`.
mod iso_utc {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn trade_normalizes_symbol() {
        let tick = Tick::trade("  aapl ", Decimal::new(18942, 2), 100, at(0)).unwrap();
        assert_eq!(tick.symbol(), "AAPL");
        assert_eq!(tick.event_type(), EventType::Trade);
    }

    #[test_case("", Decimal::ONE, 1 => TickError::EmptySymbol; "empty symbol")]
    #[test_case("   ", Decimal::ONE, 1 => TickError::EmptySymbol; "blank symbol")]
    #[test_case("AAPL", Decimal::ZERO, 1 => TickError::NonPositivePrice(Decimal::ZERO); "zero price")]
    #[test_case("AAPL", Decimal::NEGATIVE_ONE, 1 => TickError::NonPositivePrice(Decimal::NEGATIVE_ONE); "negative price")]
    #[test_case("AAPL", Decimal::ONE, 0 => TickError::ZeroSize; "zero size")]
    fn trade_rejects_invalid_parts(symbol: &str, price: Decimal, size: u64) -> TickError {
        Tick::trade(symbol, price, size, at(0)).unwrap_err()
    }

    #[test]
    fn json_shape_matches_store_layout() {
        let tick = Tick::trade("MSFT", Decimal::new(41050, 2), 7, at(1_705_329_000)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&tick.to_json().unwrap()).unwrap();

        assert_eq!(value["symbol"], "MSFT");
        assert_eq!(value["price"], 410.5);
        assert_eq!(value["size"], 7);
        assert_eq!(value["ts"], "2024-01-15T14:30:00Z");
        assert_eq!(value["type"], "trade");
    }

    #[test]
    fn json_round_trip_preserves_subsecond_precision() {
        let ts = Utc.timestamp_nanos(1_705_329_000_123_456_789);
        let tick = Tick::trade("TSLA", Decimal::new(21733, 2), 3, ts).unwrap();

        let decoded = Tick::from_json(&tick.to_json().unwrap()).unwrap();
        assert_eq!(decoded, tick);
        assert!(tick.to_json().unwrap().contains(".123456789Z"));
    }

    #[test]
    fn from_json_accepts_provider_type_tag() {
        let payload = r#"{"symbol":"aapl","price":101.25,"size":5,"ts":"2024-01-15T14:30:00Z","type":"T"}"#;
        let tick = Tick::from_json(payload).unwrap();
        assert_eq!(tick.symbol(), "AAPL");
        assert_eq!(tick.event_type(), EventType::Trade);
    }

    #[test]
    fn from_json_rejects_invalid_price() {
        let payload = r#"{"symbol":"AAPL","price":0.0,"size":5,"ts":"2024-01-15T14:30:00Z","type":"trade"}"#;
        assert!(Tick::from_json(payload).is_err());
    }

    #[test]
    fn normalize_symbol_handles_blank() {
        assert_eq!(normalize_symbol(" reliance.ns "), Some("RELIANCE.NS".to_string()));
        assert_eq!(normalize_symbol("\t"), None);
    }
}
