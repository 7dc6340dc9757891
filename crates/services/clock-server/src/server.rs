//! Service assembly
//!
//! Wires the clock authority, the distributor and the HTTP router together
//! and owns the background tasks' shutdown channel.

use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use playclock_core::ClockAuthority;

use crate::api::{build_router, AppState};
use crate::config::{Config, ConfigError};
use crate::distribution::Distributor;
use crate::metrics::Metrics;

/// Errors raised while starting or running the service
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Clock error: {0}")]
    Clock(#[from] playclock_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully wired PlayClock service
pub struct ClockServer {
    config: Arc<Config>,
    clock: Arc<ClockAuthority>,
    distributor: Arc<Distributor>,
    metrics: Arc<Metrics>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ClockServer {
    /// Build the service from a validated configuration
    pub fn new(config: Config) -> Result<Self, ServerError> {
        config.validate()?;

        let clock = Arc::new(ClockAuthority::new(config.clock.options())?);
        let metrics = Arc::new(Metrics::new());
        let distributor = Arc::new(Distributor::new(
            clock.clone(),
            metrics.clone(),
            &config.distribution,
        ));
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        Ok(Self {
            config: Arc::new(config),
            clock,
            distributor,
            metrics,
            shutdown_tx,
        })
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn clock(&self) -> &Arc<ClockAuthority> {
        &self.clock
    }

    pub fn distributor(&self) -> &Arc<Distributor> {
        &self.distributor
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Sender that stops the background tasks when signalled
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Router serving the HTTP API
    pub fn router(&self) -> Router {
        build_router(AppState::new(
            self.distributor.clone(),
            self.metrics.clone(),
            self.config.clone(),
        ))
    }

    /// Serve on `listener` until `shutdown` resolves
    ///
    /// Spawns the advancement and broadcast tasks, serves HTTP, and on
    /// shutdown ends every viewer stream before waiting for the tasks.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let advance_handle = tokio::spawn(self.clock.clone().run_advance_loop(
            self.config.clock.tick_interval(),
            self.shutdown_tx.subscribe(),
        ));

        let broadcast_handle = tokio::spawn(self.distributor.clone().run_broadcast_loop(
            self.config.distribution.broadcast_interval(),
            self.shutdown_tx.subscribe(),
        ));

        let router = self.router();
        tracing::info!("HTTP server listening on {}", listener.local_addr()?);

        // Viewer streams are long-lived; they only end once the broadcast task
        // disconnects everyone, so signal the tasks before draining connections.
        let shutdown_tx = self.shutdown_tx.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received, initiating graceful shutdown...");
                let _ = shutdown_tx.send(());
            })
            .await?;

        // Signal shutdown to all background tasks
        let _ = self.shutdown_tx.send(());

        // Wait for background tasks to complete
        join_background("advance", advance_handle).await;
        join_background("broadcast", broadcast_handle).await;

        Ok(())
    }
}

/// Await a background task, logging a panic or cancellation instead of dropping it
async fn join_background(name: &str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(task = name, "Background task failed: {}", e);
            false
        }
    }
}
