//! Snapshot distribution to connected viewers
//!
//! Every viewer owns a bounded outbound queue. A single broadcast sweep reads
//! one fresh snapshot per tick and offers it to each queue without blocking;
//! the HTTP layer drains each queue on that viewer's own connection task. A
//! viewer whose queue stays full for too many consecutive ticks is evicted,
//! so a stalled consumer never back-pressures the clock or other viewers.

use dashmap::DashMap;
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Duration, MissedTickBehavior};
use uuid::Uuid;

use playclock_core::{ClockAuthority, Snapshot};

use crate::config::DistributionConfig;
use crate::metrics::Metrics;

/// Opaque handle of one viewer connection
pub type ViewerId = Uuid;

/// Why a viewer left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Transport closed by the peer
    Closed,

    /// Queue stayed full for too many ticks
    Evicted,

    /// Service is stopping
    Shutdown,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::Closed => write!(f, "closed"),
            DisconnectReason::Evicted => write!(f, "evicted"),
            DisconnectReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

struct ViewerSlot {
    tx: mpsc::Sender<Snapshot>,
    /// Consecutive ticks the queue was full
    lagged: u32,
}

type Registry = DashMap<ViewerId, ViewerSlot>;

/// Outcome of one broadcast sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Viewers that accepted the snapshot
    pub delivered: usize,

    /// Viewers whose queue was full this tick
    pub dropped: usize,

    /// Viewers removed during this sweep
    pub removed: usize,
}

/// Fans clock snapshots out to every registered viewer
pub struct Distributor {
    clock: Arc<ClockAuthority>,
    viewers: Arc<Registry>,
    metrics: Arc<Metrics>,
    viewer_buffer: usize,
    max_lagged_ticks: u32,
    /// Set once by `disconnect_all`; later connections end immediately
    closed: AtomicBool,
}

impl Distributor {
    /// Create a distributor reading from `clock`
    pub fn new(
        clock: Arc<ClockAuthority>,
        metrics: Arc<Metrics>,
        config: &DistributionConfig,
    ) -> Self {
        Self {
            clock,
            viewers: Arc::new(DashMap::new()),
            metrics,
            viewer_buffer: config.viewer_buffer.max(1),
            max_lagged_ticks: config.max_lagged_ticks.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// True once the distributor has shut down
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The clock this distributor reads from
    pub fn clock(&self) -> &Arc<ClockAuthority> {
        &self.clock
    }

    /// Register a new viewer
    ///
    /// The current snapshot is queued before registration, so the first item
    /// of the returned stream always reflects the clock at connection time.
    pub fn connect(&self) -> ViewerStream {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.viewer_buffer);

        let first = self.clock.snapshot();
        if tx.try_send(first).is_ok() {
            self.metrics.snapshot_emitted();
        }

        if self.is_closed() {
            // Sender dropped here: the stream yields the first snapshot, then ends.
            tracing::debug!(viewer_id = %id, "Viewer connected after shutdown");
            return self.stream(id, rx);
        }

        self.viewers.insert(id, ViewerSlot { tx, lagged: 0 });
        self.metrics.viewer_connected();

        // A shutdown sweep that ran between the check above and the insert
        // missed this entry.
        if self.is_closed() {
            deregister(&self.viewers, &self.metrics, id, DisconnectReason::Shutdown);
            return self.stream(id, rx);
        }

        tracing::info!(
            viewer_id = %id,
            active_viewers = self.viewers.len(),
            position = first.position,
            running = first.running,
            "Viewer connected"
        );

        self.stream(id, rx)
    }

    fn stream(&self, id: ViewerId, rx: mpsc::Receiver<Snapshot>) -> ViewerStream {
        ViewerStream {
            id,
            rx,
            viewers: Arc::clone(&self.viewers),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Offer one freshly read snapshot to every registered viewer
    pub fn broadcast_once(&self) -> BroadcastReport {
        let snapshot = self.clock.snapshot();
        let mut report = BroadcastReport::default();
        let mut to_remove = Vec::new();

        for mut entry in self.viewers.iter_mut() {
            let id = *entry.key();
            let slot = entry.value_mut();

            match slot.tx.try_send(snapshot) {
                Ok(()) => {
                    slot.lagged = 0;
                    report.delivered += 1;
                    self.metrics.snapshot_emitted();
                }
                Err(TrySendError::Full(_)) => {
                    slot.lagged += 1;
                    report.dropped += 1;
                    self.metrics.snapshot_dropped();
                    tracing::debug!(viewer_id = %id, lagged = slot.lagged, "Viewer queue full");
                    if slot.lagged >= self.max_lagged_ticks {
                        to_remove.push((id, DisconnectReason::Evicted));
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    to_remove.push((id, DisconnectReason::Closed));
                }
            }
        }

        // Entries are removed after the sweep so the iteration above never
        // observes a half-modified registry.
        for (id, reason) in to_remove {
            if deregister(&self.viewers, &self.metrics, id, reason) {
                report.removed += 1;
            }
        }

        self.metrics.broadcast_tick();
        report
    }

    /// Remove every viewer, ending their streams
    ///
    /// Also closes the distributor: any later `connect` gets a stream that
    /// ends after its first snapshot.
    pub fn disconnect_all(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let ids: Vec<ViewerId> = self.viewers.iter().map(|e| *e.key()).collect();
        ids.into_iter()
            .filter(|id| deregister(&self.viewers, &self.metrics, *id, DisconnectReason::Shutdown))
            .count()
    }

    /// Number of registered viewers
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Run the periodic broadcast until shutdown
    ///
    /// Runs whether or not corrections happen in between; on shutdown every
    /// viewer stream is ended.
    pub async fn run_broadcast_loop(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            "Broadcast task started (interval: {}ms)",
            interval.as_millis()
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; new viewers already got a snapshot.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.broadcast_once();
                    if report.removed > 0 || report.dropped > 0 {
                        tracing::debug!(
                            delivered = report.delivered,
                            dropped = report.dropped,
                            removed = report.removed,
                            "Broadcast sweep"
                        );
                    }
                }
                _ = shutdown_rx.recv() => {
                    let closed = self.disconnect_all();
                    tracing::info!(closed, "Broadcast task shutting down");
                    break;
                }
            }
        }
    }
}

fn deregister(
    viewers: &Registry,
    metrics: &Metrics,
    id: ViewerId,
    reason: DisconnectReason,
) -> bool {
    if viewers.remove(&id).is_none() {
        return false;
    }

    metrics.viewer_disconnected();
    if reason == DisconnectReason::Evicted {
        metrics.viewer_evicted();
        tracing::warn!(viewer_id = %id, "Evicted slow viewer");
    }
    tracing::info!(
        viewer_id = %id,
        reason = %reason,
        active_viewers = viewers.len(),
        "Viewer disconnected"
    );
    true
}

/// Snapshots destined for one viewer
///
/// Dropping the stream (the transport went away) deregisters the viewer.
pub struct ViewerStream {
    id: ViewerId,
    rx: mpsc::Receiver<Snapshot>,
    viewers: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl ViewerStream {
    pub fn id(&self) -> ViewerId {
        self.id
    }

    /// Receive the next snapshot; `None` once the viewer was removed
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }
}

impl Stream for ViewerStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ViewerStream {
    fn drop(&mut self) {
        deregister(&self.viewers, &self.metrics, self.id, DisconnectReason::Closed);
    }
}
