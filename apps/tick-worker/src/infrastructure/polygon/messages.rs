//! Polygon WebSocket Message Types
//!
//! Wire format types for the control side of the Polygon stocks stream.
//! Trade events are not modeled here: they are read as raw JSON values and
//! handed to the [normalizer](super::normalize), which tolerates the
//! provider's loose typing.
//!
//! # Outbound
//!
//! ```json
//! {"action":"auth","params":"<key>"}
//! {"action":"subscribe","params":"T.AAPL"}
//! ```
//!
//! # Inbound
//!
//! Every frame is a JSON array of events discriminated by `ev`:
//!
//! ```json
//! [{"ev":"status","status":"auth_success","message":"authenticated"}]
//! [{"ev":"T","sym":"AAPL","p":189.42,"s":100,"t":1705329000123}]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channel prefix for trade subscriptions.
pub const TRADE_CHANNEL_PREFIX: &str = "T.";

// =============================================================================
// Outbound Requests
// =============================================================================

/// Authentication request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest<'a> {
    /// Action: "auth"
    pub action: &'static str,

    /// API key
    pub params: &'a str,
}

impl<'a> AuthRequest<'a> {
    /// Create an authentication request for `key`.
    #[must_use]
    pub const fn new(key: &'a str) -> Self {
        Self {
            action: "auth",
            params: key,
        }
    }
}

/// Subscription request for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    /// Action: "subscribe"
    pub action: &'static str,

    /// Channel, e.g. `T.AAPL`
    pub params: String,
}

impl SubscribeRequest {
    /// Subscribe to the trade channel of `symbol`.
    #[must_use]
    pub fn trades(symbol: &str) -> Self {
        Self {
            action: "subscribe",
            params: format!("{TRADE_CHANNEL_PREFIX}{symbol}"),
        }
    }
}

// =============================================================================
// Status Events
// =============================================================================

/// Value of the `status` field of a status event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Socket accepted.
    Connected,
    /// Key accepted.
    AuthSuccess,
    /// Key rejected.
    AuthFailed,
    /// Subscription or other informational status.
    #[serde(other)]
    Other,
}

/// Status event.
///
/// # Wire Format (JSON)
/// ```json
/// {"ev":"status","status":"auth_failed","message":"authentication failed"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusEvent {
    /// Status kind
    pub status: StatusKind,

    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

impl StatusEvent {
    /// Parse a status event, returning `None` for any other event type.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        if !is_status(value) {
            return None;
        }
        Self::deserialize(value).ok()
    }
}

/// Check whether an event is a status event.
#[must_use]
pub fn is_status(value: &Value) -> bool {
    value.get("ev").and_then(Value::as_str) == Some("status")
}
