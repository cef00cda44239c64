//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the feeds themselves.

/// Configuration loaded from the environment.
pub mod config;

/// Health check, metrics and read-back HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Polygon WebSocket live feed.
pub mod polygon;

/// Seeded random-walk feed.
pub mod simulator;

/// Tick store adapters (Redis, in-memory).
pub mod store;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
