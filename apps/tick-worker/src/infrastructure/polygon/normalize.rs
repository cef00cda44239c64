//! Tick Normalizer
//!
//! Converts raw Polygon events into canonical [`Tick`]s. The provider is
//! loosely typed (prices arrive as numbers or strings, sizes may be missing
//! or fractional), so every field is parsed leniently and a bad event is
//! reported as a [`DropReason`] instead of an error that could end the
//! session.
//!
//! | Field     | Source (fallback)  | Rule                                   |
//! |-----------|--------------------|----------------------------------------|
//! | symbol    | `sym` (`ticker`)   | trimmed, upper-cased, non-empty         |
//! | price     | `p` (`price`)      | number or numeric string, > 0           |
//! | size      | `s` (`size`)       | positive integer, truncated, else 1     |
//! | timestamp | `t`                | epoch milliseconds, else wall clock     |
//!
//! A blank primary (`null`, `0`, `""`, ...) yields to its fallback.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::domain::tick::{Tick, TickError, normalize_symbol};

/// `ev` tag of trade events.
pub const TRADE_EVENT: &str = "T";

/// Why an inbound event produced no tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum DropReason {
    /// Element of a batch was not a JSON object.
    #[error("event is not a JSON object")]
    NotAnObject,

    /// Event type other than a trade.
    #[error("event is not a trade")]
    NotATrade,

    /// No usable symbol.
    #[error("missing or empty symbol")]
    MissingSymbol,

    /// No price field.
    #[error("missing price")]
    MissingPrice,

    /// Price was non-numeric, zero or negative.
    #[error("price is not a positive number")]
    InvalidPrice,

    /// Size could not be made positive.
    #[error("size is not positive")]
    InvalidSize,
}

impl DropReason {
    /// Get the metric label for this reason.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotAnObject => "not_object",
            Self::NotATrade => "not_trade",
            Self::MissingSymbol => "missing_symbol",
            Self::MissingPrice => "missing_price",
            Self::InvalidPrice => "invalid_price",
            Self::InvalidSize => "invalid_size",
        }
    }
}

impl From<TickError> for DropReason {
    fn from(err: TickError) -> Self {
        match err {
            TickError::EmptySymbol => Self::MissingSymbol,
            TickError::NonPositivePrice(_) => Self::InvalidPrice,
            TickError::ZeroSize => Self::InvalidSize,
        }
    }
}

/// Normalize one raw event.
///
/// # Errors
///
/// Returns the [`DropReason`] when the event is not a usable trade.
pub fn normalize(raw: &Value) -> Result<Tick, DropReason> {
    let event = raw.as_object().ok_or(DropReason::NotAnObject)?;

    if event.get("ev").and_then(Value::as_str) != Some(TRADE_EVENT) {
        return Err(DropReason::NotATrade);
    }

    let symbol = field(event, "sym", "ticker")
        .and_then(Value::as_str)
        .and_then(normalize_symbol)
        .ok_or(DropReason::MissingSymbol)?;

    let price = field(event, "p", "price").ok_or(DropReason::MissingPrice)?;
    let price = parse_price(price).ok_or(DropReason::InvalidPrice)?;

    let size = field(event, "s", "size").and_then(parse_size).unwrap_or(1);
    let timestamp = event
        .get("t")
        .and_then(parse_epoch_millis)
        .unwrap_or_else(Utc::now);

    Ok(Tick::trade(&symbol, price, size, timestamp)?)
}

/// Normalize every element of a batch independently.
#[must_use]
pub fn normalize_batch(events: &[Value]) -> Vec<Result<Tick, DropReason>> {
    events.iter().map(normalize).collect()
}

/// Primary field, or the fallback when the primary is absent or blank.
///
/// A blank primary (`null`, `false`, `0`, `""`, empty container) yields to a
/// non-blank fallback. With no usable fallback the non-null primary is kept,
/// so the drop reason still describes the value that was sent.
fn field<'a>(event: &'a Map<String, Value>, primary: &str, fallback: &str) -> Option<&'a Value> {
    let primary = event.get(primary).filter(|v| !v.is_null());
    let fallback = event.get(fallback).filter(|v| !v.is_null());

    primary
        .filter(|v| !is_blank(v))
        .or_else(|| fallback.filter(|v| !is_blank(v)))
        .or(primary)
        .or(fallback)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn parse_price(value: &Value) -> Option<Decimal> {
    let price = match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }?;

    (price > Decimal::ZERO).then_some(price)
}

/// Exact decimal parse, falling back to `f64` for exponent notation.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw).ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(|f| Decimal::try_from(f).ok())
    })
}

fn parse_size(value: &Value) -> Option<u64> {
    let size = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(truncate_size)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate_size))
        }
        _ => None,
    }?;

    (size > 0).then_some(size)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn truncate_size(raw: f64) -> Option<u64> {
    if raw.is_finite() && raw >= 1.0 {
        Some(raw.trunc().min(u64::MAX as f64) as u64)
    } else {
        None
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_epoch_millis(value: &Value) -> Option<DateTime<Utc>> {
    let millis = value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|ms| ms.is_finite() && ms.abs() < 9.0e15)
            .map(|ms| ms.trunc() as i64)
    })?;

    if millis <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn normalizes_polygon_trade() {
        let raw = json!({"ev": "T", "sym": "aapl", "p": 189.42, "s": 100, "t": 1_705_329_000_123_i64});
        let tick = normalize(&raw).unwrap();

        assert_eq!(tick.symbol(), "AAPL");
        assert_eq!(tick.price(), Decimal::new(18942, 2));
        assert_eq!(tick.size(), 100);
        assert_eq!(tick.timestamp().timestamp_millis(), 1_705_329_000_123);
    }

    #[test]
    fn accepts_fallback_fields_and_string_price() {
        let raw = json!({"ev": "T", "ticker": " msft ", "price": "410.50", "size": 7});
        let tick = normalize(&raw).unwrap();

        assert_eq!(tick.symbol(), "MSFT");
        assert_eq!(tick.price(), Decimal::new(41050, 2));
        assert_eq!(tick.size(), 7);
    }

    #[test_case(json!({"ev": "T", "sym": "AAPL", "p": 0, "price": 101.5}) => Decimal::new(1015, 1); "zero primary price")]
    #[test_case(json!({"ev": "T", "sym": "AAPL", "p": "", "price": "7.25"}) => Decimal::new(725, 2); "empty primary price")]
    #[test_case(json!({"ev": "T", "sym": "AAPL", "p": 3, "price": 9}) => Decimal::new(3, 0); "primary wins when usable")]
    fn blank_primary_price_yields_to_fallback(raw: Value) -> Decimal {
        normalize(&raw).unwrap().price()
    }

    #[test]
    fn blank_primary_symbol_and_size_yield_to_fallback() {
        let raw = json!({"ev": "T", "sym": "", "ticker": "nvda", "p": 1, "s": 0, "size": 25});
        let tick = normalize(&raw).unwrap();
        assert_eq!(tick.symbol(), "NVDA");
        assert_eq!(tick.size(), 25);
    }

    #[test]
    fn missing_timestamp_uses_wall_clock() {
        let before = Utc::now();
        let tick = normalize(&json!({"ev": "T", "sym": "TSLA", "p": 1})).unwrap();
        assert!(tick.timestamp() >= before);
        assert!(tick.timestamp() <= Utc::now());
    }

    #[test_case(json!({"ev": "T", "sym": "A", "p": 1}) => 1; "missing size")]
    #[test_case(json!({"ev": "T", "sym": "A", "p": 1, "s": "lots"}) => 1; "non-numeric size")]
    #[test_case(json!({"ev": "T", "sym": "A", "p": 1, "s": 0}) => 1; "zero size")]
    #[test_case(json!({"ev": "T", "sym": "A", "p": 1, "s": -5}) => 1; "negative size")]
    #[test_case(json!({"ev": "T", "sym": "A", "p": 1, "s": 0.4}) => 1; "sub-unit size")]
    #[test_case(json!({"ev": "T", "sym": "A", "p": 1, "s": 12.9}) => 12; "fractional size")]
    #[test_case(json!({"ev": "T", "sym": "A", "p": 1, "s": "30"}) => 30; "string size")]
    fn size_defaults(raw: Value) -> u64 {
        normalize(&raw).unwrap().size()
    }

    #[test_case(json!([1, 2]) => DropReason::NotAnObject; "array element")]
    #[test_case(json!({"ev": "Q", "sym": "AAPL", "bp": 1.0}) => DropReason::NotATrade; "quote")]
    #[test_case(json!({"sym": "AAPL", "p": 1.0}) => DropReason::NotATrade; "no event type")]
    #[test_case(json!({"ev": "T", "p": 1.0}) => DropReason::MissingSymbol; "no symbol")]
    #[test_case(json!({"ev": "T", "sym": "  ", "p": 1.0}) => DropReason::MissingSymbol; "blank symbol")]
    #[test_case(json!({"ev": "T", "sym": 42, "p": 1.0}) => DropReason::MissingSymbol; "numeric symbol")]
    #[test_case(json!({"ev": "T", "sym": "AAPL"}) => DropReason::MissingPrice; "no price")]
    #[test_case(json!({"ev": "T", "sym": "AAPL", "p": null}) => DropReason::MissingPrice; "null price")]
    #[test_case(json!({"ev": "T", "sym": "AAPL", "p": "abc"}) => DropReason::InvalidPrice; "non-numeric price")]
    #[test_case(json!({"ev": "T", "sym": "AAPL", "p": "NaN"}) => DropReason::InvalidPrice; "nan price")]
    #[test_case(json!({"ev": "T", "sym": "AAPL", "p": 0}) => DropReason::InvalidPrice; "zero price")]
    #[test_case(json!({"ev": "T", "sym": "AAPL", "p": -3.5}) => DropReason::InvalidPrice; "negative price")]
    #[test_case(json!({"ev": "T", "sym": "AAPL", "p": true}) => DropReason::InvalidPrice; "boolean price")]
    fn drops_unusable_events(raw: Value) -> DropReason {
        normalize(&raw).unwrap_err()
    }

    #[test]
    fn invalid_timestamp_falls_back_to_now() {
        let before = Utc::now();
        let tick = normalize(&json!({"ev": "T", "sym": "A", "p": 1, "t": "yesterday"})).unwrap();
        assert!(tick.timestamp() >= before);

        let tick = normalize(&json!({"ev": "T", "sym": "A", "p": 1, "t": -1})).unwrap();
        assert!(tick.timestamp() >= before);
    }

    #[test]
    fn batch_isolates_bad_elements() {
        let batch = vec![
            json!({"ev": "T", "sym": "AAPL", "p": 101.5}),
            json!({"ev": "T", "sym": "MSFT", "p": "abc"}),
        ];
        let results = normalize_batch(&batch);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().symbol(), "AAPL");
        assert_eq!(results[1], Err(DropReason::InvalidPrice));
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<f64>()
                .prop_filter("finite", |f| f.is_finite())
                .prop_map(Value::from),
            ".{0,8}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn valid_trades_normalize(
            symbol in "[a-z]{1,5}(\\.[a-z]{2})?",
            price in 0.01f64..1_000_000.0,
            size in proptest::option::of(any::<i64>()),
        ) {
            let mut raw = json!({"ev": "T", "sym": symbol.clone(), "p": price});
            if let Some(size) = size {
                raw["s"] = json!(size);
            }

            let tick = normalize(&raw).unwrap();
            prop_assert_eq!(tick.symbol(), symbol.to_uppercase());
            prop_assert!(tick.price() > Decimal::ZERO);
            prop_assert!(tick.size() >= 1);
        }

        #[test]
        fn never_panics_on_arbitrary_events(
            ev in prop_oneof![
                Just("T".to_string()),
                Just("Q".to_string()),
                Just("status".to_string()),
                ".{0,3}",
            ],
            sym in leaf(),
            p in leaf(),
            s in leaf(),
            t in leaf(),
        ) {
            let raw = json!({"ev": ev, "sym": sym, "p": p, "s": s, "t": t});
            if let Ok(tick) = normalize(&raw) {
                prop_assert!(!tick.symbol().is_empty());
                prop_assert!(tick.price() > Decimal::ZERO);
                prop_assert!(tick.size() >= 1);
            }
        }
    }
}
