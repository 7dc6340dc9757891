//! PlayClock server binary
//!
//! Entry point for the clock authority and fan-out service.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (0.0.0.0:3000)
//! cargo run -p playclock-server
//!
//! # With a config file and debug logging
//! PLAYCLOCK_CONFIG=./playclock.toml RUST_LOG=debug cargo run -p playclock-server
//! ```
//!
//! # Environment Variables
//!
//! - `PLAYCLOCK_CONFIG`: Path to a TOML config file
//! - `PLAYCLOCK_HOST` / `PLAYCLOCK_PORT`: Bind address (default: `0.0.0.0:3000`)
//! - `PLAYCLOCK_TICK_MS`: Clock advancement period (default: `100`)
//! - `PLAYCLOCK_DURATION_SECS`: Loop length; unset for an unbounded clock
//! - `PLAYCLOCK_BROADCAST_MS`: Snapshot push period (default: `1000`)
//! - `RUST_LOG`: Logging level (default: `info,tower_http=debug`)

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playclock_server::{config::Config, server::ClockServer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting PlayClock server...");

    // Load configuration
    let config_path = std::env::var("PLAYCLOCK_CONFIG").ok();
    let config = Config::load(config_path.as_deref())?;

    tracing::info!(
        "Configuration: bind={}, tick={}ms, broadcast={}ms, duration={:?}",
        config.bind_addr(),
        config.clock.tick_interval_ms,
        config.distribution.broadcast_interval_ms,
        config.clock.duration_secs
    );

    let bind_addr = config.bind_addr();
    let server = ClockServer::new(config)?;

    let listener = TcpListener::bind(&bind_addr).await?;
    server.serve(listener, shutdown_signal()).await?;

    tracing::info!("PlayClock server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
