//! Domain Layer - Core tick types.
//!
//! Pure types with no I/O: the canonical tick record, the watchlist shared
//! by every feed, and the live session state machine.

/// Live feed session state machine.
pub mod session;

/// Canonical trade tick.
pub mod tick;

/// Configured instrument set.
pub mod watchlist;
