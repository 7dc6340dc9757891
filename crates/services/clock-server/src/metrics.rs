//! Metrics collection for the PlayClock server
//!
//! Provides basic counters for monitoring fan-out health. The collector is
//! owned by the service and shared by `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Server metrics collector
#[derive(Default)]
pub struct Metrics {
    /// Total viewers that opened a subscription
    viewers_connected: AtomicU64,

    /// Total viewers whose subscription ended
    viewers_disconnected: AtomicU64,

    /// Viewers dropped for falling too far behind
    viewers_evicted: AtomicU64,

    /// Currently registered viewers
    active_viewers: AtomicU64,

    /// Snapshots queued for delivery
    snapshots_emitted: AtomicU64,

    /// Snapshots dropped because a viewer queue was full
    snapshots_dropped: AtomicU64,

    /// Broadcast sweeps performed
    broadcast_ticks: AtomicU64,

    /// Corrections accepted
    corrections_applied: AtomicU64,

    /// Corrections rejected as invalid
    corrections_rejected: AtomicU64,

    /// Startup timestamp (unix seconds)
    startup_time: AtomicU64,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self {
            startup_time: AtomicU64::new(now),
            ..Default::default()
        }
    }

    /// Record a viewer subscribing
    pub fn viewer_connected(&self) {
        self.viewers_connected.fetch_add(1, Ordering::Relaxed);
        self.active_viewers.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a viewer leaving
    pub fn viewer_disconnected(&self) {
        self.viewers_disconnected.fetch_add(1, Ordering::Relaxed);
        self.active_viewers.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a slow viewer being evicted
    pub fn viewer_evicted(&self) {
        self.viewers_evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a snapshot queued for a viewer
    pub fn snapshot_emitted(&self) {
        self.snapshots_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a snapshot dropped on overflow
    pub fn snapshot_dropped(&self) {
        self.snapshots_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a broadcast sweep
    pub fn broadcast_tick(&self) {
        self.broadcast_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted correction
    pub fn correction_applied(&self) {
        self.corrections_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected correction
    pub fn correction_rejected(&self) {
        self.corrections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let uptime_secs = now.saturating_sub(self.startup_time.load(Ordering::Relaxed));

        MetricsSnapshot {
            viewers_connected: self.viewers_connected.load(Ordering::Relaxed),
            viewers_disconnected: self.viewers_disconnected.load(Ordering::Relaxed),
            viewers_evicted: self.viewers_evicted.load(Ordering::Relaxed),
            active_viewers: self.active_viewers.load(Ordering::Relaxed),
            snapshots_emitted: self.snapshots_emitted.load(Ordering::Relaxed),
            snapshots_dropped: self.snapshots_dropped.load(Ordering::Relaxed),
            broadcast_ticks: self.broadcast_ticks.load(Ordering::Relaxed),
            corrections_applied: self.corrections_applied.load(Ordering::Relaxed),
            corrections_rejected: self.corrections_rejected.load(Ordering::Relaxed),
            uptime_secs,
        }
    }

    /// Get active viewer count
    pub fn active_viewer_count(&self) -> u64 {
        self.active_viewers.load(Ordering::Relaxed)
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub viewers_connected: u64,
    pub viewers_disconnected: u64,
    pub viewers_evicted: u64,
    pub active_viewers: u64,
    pub snapshots_emitted: u64,
    pub snapshots_dropped: u64,
    pub broadcast_ticks: u64,
    pub corrections_applied: u64,
    pub corrections_rejected: u64,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl MetricsSnapshot {
    /// Fraction of queued snapshots that were dropped on overflow
    pub fn drop_rate(&self) -> f64 {
        let attempted = self.snapshots_emitted + self.snapshots_dropped;
        if attempted == 0 {
            0.0
        } else {
            self.snapshots_dropped as f64 / attempted as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.viewers_connected, 0);
        assert_eq!(snapshot.active_viewers, 0);
        assert_eq!(snapshot.snapshots_emitted, 0);
    }

    #[test]
    fn test_viewer_tracking() {
        let metrics = Metrics::new();

        metrics.viewer_connected();
        metrics.viewer_connected();
        assert_eq!(metrics.active_viewer_count(), 2);

        metrics.viewer_disconnected();
        assert_eq!(metrics.active_viewer_count(), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.viewers_connected, 2);
        assert_eq!(snapshot.viewers_disconnected, 1);
        assert_eq!(snapshot.active_viewers, 1);
    }

    #[test]
    fn test_drop_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().drop_rate(), 0.0);

        for _ in 0..3 {
            metrics.snapshot_emitted();
        }
        metrics.snapshot_dropped();

        let snapshot = metrics.snapshot();
        assert!((snapshot.drop_rate() - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_correction_tracking() {
        let metrics = Metrics::new();
        metrics.correction_applied();
        metrics.correction_applied();
        metrics.correction_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.corrections_applied, 2);
        assert_eq!(snapshot.corrections_rejected, 1);
    }
}
