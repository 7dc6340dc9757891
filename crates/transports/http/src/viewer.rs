//! Reconciling viewer
//!
//! Follows a server's snapshot subscription and keeps a local
//! [`PlaybackSurface`] in line with it. A disconnect flips the status to
//! unsynchronized and the viewer resubscribes after a fixed delay; local
//! playback keeps going in the meantime.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Interval, MissedTickBehavior};

use crate::client::{ClockClient, Subscription};
use playclock_core::{ConnectionStatus, PlaybackSurface, Reconciler};

/// Delay before resubscribing after a disconnect
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// How often the surface is polled for local end-of-stream
const END_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Counters for one [`Viewer::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewerStats {
    pub subscriptions: u64,
    pub snapshots_applied: u64,
    pub seeks: u64,
    pub local_loops: u64,
    pub disconnects: u64,
}

/// Why a subscription session ended
enum SessionEnd {
    Shutdown,
    Disconnected,
}

pub struct Viewer {
    client: ClockClient,
    reconciler: Reconciler,
    reconnect_delay: Duration,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl Viewer {
    pub fn new(client: ClockClient) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);
        Self {
            client,
            reconciler: Reconciler::default(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            status_tx,
        }
    }

    pub fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Watch the connectivity indicator
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status_tx.send_replace(status);
        if previous != status {
            tracing::info!(?status, "Connection status changed");
        }
    }

    /// Follow the server until `shutdown` resolves
    ///
    /// Local end-of-stream is handled throughout, including while the
    /// subscription is down or being re-established.
    pub async fn run<S, F>(&self, surface: &mut S, shutdown: F) -> ViewerStats
    where
        S: PlaybackSurface + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = ViewerStats::default();

        let mut end_check = interval(END_CHECK_INTERVAL);
        end_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.set_status(ConnectionStatus::Connecting);

            let subscribe = self.client.subscribe();
            tokio::pin!(subscribe);
            let subscribed = loop {
                tokio::select! {
                    _ = &mut shutdown => break None,
                    _ = end_check.tick() => self.check_local_end(surface, &mut stats),
                    result = &mut subscribe => break Some(result),
                }
            };

            match subscribed {
                None => break,
                Some(Ok(subscription)) => {
                    stats.subscriptions += 1;
                    let end = self
                        .follow(subscription, surface, &mut shutdown, &mut end_check, &mut stats)
                        .await;
                    if let SessionEnd::Shutdown = end {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Subscription failed");
                }
            }

            stats.disconnects += 1;
            self.set_status(ConnectionStatus::Unsynchronized);

            let backoff = sleep(self.reconnect_delay);
            tokio::pin!(backoff);
            let stop = loop {
                tokio::select! {
                    _ = &mut shutdown => break true,
                    _ = end_check.tick() => self.check_local_end(surface, &mut stats),
                    _ = &mut backoff => break false,
                }
            };
            if stop {
                break;
            }
        }

        self.set_status(ConnectionStatus::Unsynchronized);
        tracing::info!(?stats, "Viewer stopped");
        stats
    }

    /// Loop the surface back to zero if it reached its end
    fn check_local_end<S>(&self, surface: &mut S, stats: &mut ViewerStats)
    where
        S: PlaybackSurface + ?Sized,
    {
        if surface.is_ended() {
            self.reconciler.on_ended(surface);
            stats.local_loops += 1;
        }
    }

    async fn follow<S, F>(
        &self,
        mut subscription: Subscription,
        surface: &mut S,
        shutdown: &mut std::pin::Pin<&mut F>,
        end_check: &mut Interval,
        stats: &mut ViewerStats,
    ) -> SessionEnd
    where
        S: PlaybackSurface + ?Sized,
        F: Future<Output = ()>,
    {
        loop {
            tokio::select! {
                _ = shutdown.as_mut() => return SessionEnd::Shutdown,

                _ = end_check.tick() => self.check_local_end(surface, stats),

                next = subscription.next() => match next {
                    Ok(snapshot) => {
                        let outcome = self.reconciler.apply(surface, &snapshot);
                        stats.snapshots_applied += 1;
                        if outcome.seeked_to.is_some() {
                            stats.seeks += 1;
                        }
                        tracing::debug!(
                            position = snapshot.position,
                            running = snapshot.running,
                            drift = outcome.drift,
                            "Snapshot applied"
                        );
                        self.set_status(ConnectionStatus::Synchronized);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Subscription lost");
                        return SessionEnd::Disconnected;
                    }
                }
            }
        }
    }
}
