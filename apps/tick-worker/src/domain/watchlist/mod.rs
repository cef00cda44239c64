//! Watchlist
//!
//! The fixed, ordered set of instruments the worker ingests. Built once at
//! startup and shared immutably by every feed.

use super::tick::normalize_symbol;

/// Errors raised while parsing a watchlist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchlistError {
    /// No symbols were configured.
    #[error("watchlist is empty")]
    Empty,

    /// A symbol contains whitespace.
    #[error("invalid symbol in watchlist: {0:?}")]
    InvalidSymbol(String),
}

/// Ordered, de-duplicated set of uppercase symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchlist {
    symbols: Vec<String>,
}

impl Watchlist {
    /// Build a watchlist from individual symbols.
    ///
    /// Symbols are trimmed and upper-cased; blanks are skipped and
    /// duplicates keep their first position.
    ///
    /// # Errors
    ///
    /// Returns [`WatchlistError::Empty`] if no symbol remains, or
    /// [`WatchlistError::InvalidSymbol`] if one contains inner whitespace.
    pub fn new<I, S>(symbols: I) -> Result<Self, WatchlistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();

        for raw in symbols {
            let Some(symbol) = normalize_symbol(raw.as_ref()) else {
                continue;
            };
            if symbol.chars().any(char::is_whitespace) {
                return Err(WatchlistError::InvalidSymbol(symbol));
            }
            if !out.contains(&symbol) {
                out.push(symbol);
            }
        }

        if out.is_empty() {
            return Err(WatchlistError::Empty);
        }

        Ok(Self { symbols: out })
    }

    /// Parse a comma-separated list such as `"AAPL,MSFT,TSLA"`.
    ///
    /// # Errors
    ///
    /// See [`Watchlist::new`].
    pub fn parse(list: &str) -> Result<Self, WatchlistError> {
        Self::new(list.split(','))
    }

    /// Symbols in configured order.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Iterate symbols in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    /// Number of symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether there are no symbols. Never true for a constructed watchlist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Check whether a symbol is watched (case-insensitive).
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        normalize_symbol(symbol).is_some_and(|s| self.symbols.contains(&s))
    }
}

impl std::fmt::Display for Watchlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.symbols.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_uppercases_and_dedupes() {
        let list = Watchlist::parse(" aapl, MSFT ,,tsla,AAPL,reliance.ns").unwrap();
        assert_eq!(list.symbols(), ["AAPL", "MSFT", "TSLA", "RELIANCE.NS"]);
        assert_eq!(list.len(), 4);
        assert_eq!(list.to_string(), "AAPL,MSFT,TSLA,RELIANCE.NS");
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(Watchlist::parse(""), Err(WatchlistError::Empty));
        assert_eq!(Watchlist::parse(" , ,"), Err(WatchlistError::Empty));
    }

    #[test]
    fn parse_rejects_inner_whitespace() {
        assert_eq!(
            Watchlist::parse("AAPL,BRK B"),
            Err(WatchlistError::InvalidSymbol("BRK B".to_string()))
        );
    }

    #[test]
    fn contains_is_case_insensitive() {
        let list = Watchlist::parse("AAPL").unwrap();
        assert!(list.contains("aapl"));
        assert!(!list.contains("MSFT"));
    }
}
