//! Tick Worker Binary
//!
//! Starts the tick ingestion worker.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tick-worker
//! ```
//!
//! # Environment Variables
//!
//! - `POLYGON_API_KEY`: Polygon API key (unset or blank: simulated feed)
//! - `POLYGON_WS_URL`: Live endpoint (default: wss://socket.polygon.io/stocks)
//! - `REDIS_URL`: Store URL (default: redis://redis:6379/0, `memory://` for in-process)
//! - `WATCHLIST`: Comma-separated symbols (default: AAPL,MSFT,TSLA,RELIANCE.NS)
//! - `TICK_LIST_LEN`: Recent-window capacity per symbol (default: 200)
//! - `SIM_TICK_INTERVAL_MS`: Simulated feed cadence (default: 1000)
//! - `SIM_SEED`: Seed for the simulated feed (default: random)
//! - `LIVE_MAX_RECONNECT_ATTEMPTS`: Live retries before fallback (default: 3)
//! - `WORKER_HEALTH_PORT`: Health and read-back HTTP port (default: 8083, 0 disables)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tick_worker::infrastructure::health::{HealthServer, HealthServerState};
use tick_worker::infrastructure::{store, telemetry};
use tick_worker::{
    FeedStatus, FeedSupervisor, SupervisorConfig, TickPublisher, WorkerConfig, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    load_dotenv();

    // Initialize telemetry (tracing + optional OTLP)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting tick worker");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = WorkerConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let tick_store = store::open(&config.redis_url)
        .with_context(|| format!("cannot open store {}", config.redacted_store_url()))?;
    let status = Arc::new(FeedStatus::new());
    let publisher = TickPublisher::new(
        Arc::clone(&tick_store),
        config.recent_capacity,
        Arc::clone(&status),
    );

    // Spawn health server
    let health_handle = if config.server.health_port == 0 {
        tracing::info!("Health server disabled");
        None
    } else {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            Arc::clone(&status),
            Arc::clone(&tick_store),
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        Some(tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        }))
    };

    // Spawn feed supervisor
    let supervisor = FeedSupervisor::new(
        SupervisorConfig {
            live: config.live,
            reconnect: config.reconnect,
            simulator: config.simulator,
        },
        Arc::new(config.watchlist),
        publisher,
        status,
        shutdown_token.clone(),
    );
    let supervisor_handle = tokio::spawn(supervisor.run());

    tracing::info!("Tick worker ready");

    await_shutdown(&shutdown_token).await;

    let drain = async {
        if let Err(e) = supervisor_handle.await {
            tracing::error!(error = %e, "Feed supervisor panicked");
        }
        if let Some(handle) = health_handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "Health server panicked");
        }
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Graceful shutdown timed out"
        );
    }

    tracing::info!("Tick worker stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &WorkerConfig) {
    tracing::info!(
        feed = config.initial_mode().as_str(),
        store = %config.redacted_store_url(),
        symbols = ?config.watchlist.symbols(),
        recent_capacity = config.recent_capacity,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    if let Some(live) = &config.live {
        tracing::debug!(
            url = %live.url,
            max_reconnect_attempts = config.reconnect.max_attempts,
            "Live feed endpoint"
        );
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel.
async fn await_shutdown(shutdown_token: &CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
