//! Polygon WebSocket Authentication
//!
//! Polygon expects the API key as the first message after the socket
//! opens:
//!
//! 1. Connect to the WebSocket endpoint
//! 2. Receive `[{"ev":"status","status":"connected",...}]`
//! 3. Send `{"action":"auth","params":"<key>"}`
//! 4. Receive `[{"ev":"status","status":"auth_success",...}]` or
//!    `[{"ev":"status","status":"auth_failed",...}]`

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum time to wait for the `auth_success` acknowledgment.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The configured key cannot be a valid Polygon key.
    #[error("invalid API key: {0}")]
    InvalidKey(String),

    /// The provider answered `auth_failed`.
    #[error("authentication rejected: {0}")]
    Rejected(String),

    /// No acknowledgment arrived in time.
    #[error("authentication timeout after {}ms", .0.as_millis())]
    Timeout(Duration),
}

// =============================================================================
// API Key
// =============================================================================

/// Polygon API key.
///
/// `Debug` and `Display` redact the value so the key never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Validate and wrap a raw key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the key is empty or contains
    /// whitespace or control characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, AuthError> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(AuthError::InvalidKey("key cannot be empty".to_string()));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AuthError::InvalidKey(
                "key cannot contain whitespace".to_string(),
            ));
        }

        Ok(Self(raw))
    }

    /// The raw key, for the auth message only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiKey").field(&"[REDACTED]").finish()
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn accepts_plain_key() {
        let key = ApiKey::new("pk_abc123").unwrap();
        assert_eq!(key.expose(), "pk_abc123");
    }

    #[test_case(""; "empty")]
    #[test_case("abc def"; "inner space")]
    #[test_case(" abc"; "leading space")]
    #[test_case("abc\n"; "newline")]
    fn rejects_malformed_key(raw: &str) {
        assert!(matches!(ApiKey::new(raw), Err(AuthError::InvalidKey(_))));
    }

    #[test]
    fn key_is_redacted() {
        let key = ApiKey::new("super-secret").unwrap();
        assert!(!format!("{key:?}").contains("super-secret"));
        assert!(!key.to_string().contains("super-secret"));
        assert!(format!("{key:?}").contains("[REDACTED]"));
    }

    #[test]
    fn timeout_message_names_limit() {
        assert_eq!(
            AuthError::Timeout(AUTH_TIMEOUT).to_string(),
            "authentication timeout after 10000ms"
        );
        assert_eq!(
            AuthError::Timeout(Duration::from_millis(250)).to_string(),
            "authentication timeout after 250ms"
        );
    }
}
