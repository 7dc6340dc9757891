//! Viewer-side reconciliation
//!
//! A viewer renders the stream locally and treats pushed snapshots as
//! corrections: large drift is fixed by a hard seek, never by changing the
//! playback rate, and the run state simply follows the authority. Local
//! end-of-stream loops to zero on its own, independent of the server's
//! wrap rule.

use serde::Serialize;
use tokio::time::Instant;

use crate::clock::Snapshot;

/// Maximum drift in seconds tolerated before a viewer hard-seeks
pub const DEFAULT_DRIFT_TOLERANCE: f64 = 1.0;

/// A local rendering surface that can be seeked and paused
pub trait PlaybackSurface {
    /// Current local position in seconds
    fn position(&self) -> f64;

    /// Whether local playback is paused
    fn is_paused(&self) -> bool;

    /// Jump to `position` seconds
    fn seek(&mut self, position: f64);

    /// Resume local playback
    fn play(&mut self);

    /// Pause local playback
    fn pause(&mut self);

    /// True once local playback has reached the end of the media
    fn is_ended(&self) -> bool {
        false
    }
}

/// Change applied to the run state by one reconciliation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAction {
    None,
    Resumed,
    Paused,
}

/// Result of applying one snapshot to a surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReconcileOutcome {
    /// Local drift before the step (local minus authoritative)
    pub drift: f64,

    /// Target of the hard seek, if one was needed
    pub seeked_to: Option<f64>,

    /// Run-state change, if any
    pub run_action: RunAction,
}

impl ReconcileOutcome {
    /// True if the step touched the surface
    pub fn changed(&self) -> bool {
        self.seeked_to.is_some() || self.run_action != RunAction::None
    }
}

/// Applies authoritative snapshots to a local surface
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    drift_tolerance: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_DRIFT_TOLERANCE)
    }
}

impl Reconciler {
    /// Create a reconciler; negative or non-finite tolerances fall back to the default
    pub fn new(drift_tolerance: f64) -> Self {
        let drift_tolerance = if drift_tolerance.is_finite() && drift_tolerance >= 0.0 {
            drift_tolerance
        } else {
            DEFAULT_DRIFT_TOLERANCE
        };
        Self { drift_tolerance }
    }

    pub fn drift_tolerance(&self) -> f64 {
        self.drift_tolerance
    }

    /// Bring `surface` in line with `snapshot`
    pub fn apply<S: PlaybackSurface + ?Sized>(
        &self,
        surface: &mut S,
        snapshot: &Snapshot,
    ) -> ReconcileOutcome {
        let drift = surface.position() - snapshot.position;

        let seeked_to = if drift.abs() > self.drift_tolerance {
            tracing::debug!(
                local = surface.position(),
                authoritative = snapshot.position,
                "Drift exceeds tolerance, seeking"
            );
            surface.seek(snapshot.position);
            Some(snapshot.position)
        } else {
            None
        };

        let run_action = match (snapshot.running, surface.is_paused()) {
            (true, true) => {
                surface.play();
                RunAction::Resumed
            }
            (false, false) => {
                surface.pause();
                RunAction::Paused
            }
            _ => RunAction::None,
        };

        ReconcileOutcome {
            drift,
            seeked_to,
            run_action,
        }
    }

    /// Handle local end-of-stream by looping to zero and continuing playback
    pub fn on_ended<S: PlaybackSurface + ?Sized>(&self, surface: &mut S) {
        tracing::debug!("Local end of stream, looping to 0");
        surface.seek(0.0);
        surface.play();
    }
}

/// Connectivity indicator derived from subscription events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Subscription requested, nothing received yet
    Connecting,
    /// Receiving snapshots
    Synchronized,
    /// Subscription failed or closed
    Unsynchronized,
}

impl ConnectionStatus {
    pub fn is_synchronized(&self) -> bool {
        matches!(self, ConnectionStatus::Synchronized)
    }
}

/// In-process surface that plays back against the local monotonic clock
///
/// Useful wherever a real renderer is absent: the local position moves with
/// wall time while playing and, when a media duration is known, reports
/// end-of-stream once it is reached.
#[derive(Debug, Clone)]
pub struct SimulatedSurface {
    base_position: f64,
    started_at: Option<Instant>,
    media_duration: Option<f64>,
}

impl SimulatedSurface {
    /// Create a paused surface at position zero
    pub fn new(media_duration: Option<f64>) -> Self {
        Self {
            base_position: 0.0,
            started_at: None,
            media_duration: media_duration.filter(|d| d.is_finite() && *d > 0.0),
        }
    }

    pub fn media_duration(&self) -> Option<f64> {
        self.media_duration
    }

    fn raw_position(&self) -> f64 {
        match self.started_at {
            Some(started) => self.base_position + started.elapsed().as_secs_f64(),
            None => self.base_position,
        }
    }
}

impl PlaybackSurface for SimulatedSurface {
    fn position(&self) -> f64 {
        let p = self.raw_position();
        match self.media_duration {
            Some(d) => p.min(d),
            None => p,
        }
    }

    fn is_paused(&self) -> bool {
        self.started_at.is_none()
    }

    fn seek(&mut self, position: f64) {
        self.base_position = position.max(0.0);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn play(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.base_position = self.position();
        self.started_at = None;
    }

    fn is_ended(&self) -> bool {
        self.media_duration
            .is_some_and(|d| self.raw_position() >= d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    /// Surface that records calls without any notion of time
    #[derive(Default)]
    struct RecordingSurface {
        position: f64,
        paused: bool,
        seeks: Vec<f64>,
    }

    impl PlaybackSurface for RecordingSurface {
        fn position(&self) -> f64 {
            self.position
        }
        fn is_paused(&self) -> bool {
            self.paused
        }
        fn seek(&mut self, position: f64) {
            self.position = position;
            self.seeks.push(position);
        }
        fn play(&mut self) {
            self.paused = false;
        }
        fn pause(&mut self) {
            self.paused = true;
        }
    }

    fn snap(position: f64, running: bool) -> Snapshot {
        Snapshot {
            position,
            running,
            emitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_small_drift_is_left_alone() {
        let mut surface = RecordingSurface {
            position: 10.4,
            ..Default::default()
        };
        let outcome = Reconciler::default().apply(&mut surface, &snap(10.0, true));
        assert_eq!(outcome.seeked_to, None);
        assert!(surface.seeks.is_empty());
        assert!(!outcome.changed());
    }

    #[test]
    fn test_drift_exactly_at_tolerance_is_left_alone() {
        let mut surface = RecordingSurface {
            position: 11.0,
            ..Default::default()
        };
        let outcome = Reconciler::default().apply(&mut surface, &snap(10.0, true));
        assert_eq!(outcome.seeked_to, None);
    }

    #[test]
    fn test_large_drift_hard_seeks() {
        let mut surface = RecordingSurface {
            position: 3.0,
            ..Default::default()
        };
        let outcome = Reconciler::default().apply(&mut surface, &snap(10.0, true));
        assert_eq!(outcome.seeked_to, Some(10.0));
        assert_eq!(surface.position, 10.0);
        assert!((outcome.drift + 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_state_follows_authority() {
        let reconciler = Reconciler::default();
        let mut surface = RecordingSurface {
            paused: true,
            ..Default::default()
        };

        let outcome = reconciler.apply(&mut surface, &snap(0.0, true));
        assert_eq!(outcome.run_action, RunAction::Resumed);
        assert!(!surface.paused);

        let outcome = reconciler.apply(&mut surface, &snap(0.0, false));
        assert_eq!(outcome.run_action, RunAction::Paused);
        assert!(surface.paused);

        let outcome = reconciler.apply(&mut surface, &snap(0.0, false));
        assert_eq!(outcome.run_action, RunAction::None);
    }

    #[test]
    fn test_on_ended_loops_locally() {
        let mut surface = RecordingSurface {
            position: 30.0,
            paused: true,
            ..Default::default()
        };
        Reconciler::default().on_ended(&mut surface);
        assert_eq!(surface.position, 0.0);
        assert!(!surface.paused);
    }

    #[test]
    fn test_invalid_tolerance_falls_back() {
        assert_eq!(Reconciler::new(-1.0).drift_tolerance(), DEFAULT_DRIFT_TOLERANCE);
        assert_eq!(Reconciler::new(f64::NAN).drift_tolerance(), DEFAULT_DRIFT_TOLERANCE);
        assert_eq!(Reconciler::new(0.25).drift_tolerance(), 0.25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_surface_tracks_time() {
        let mut surface = SimulatedSurface::new(None);
        assert!(surface.is_paused());

        surface.play();
        tokio::time::advance(std::time::Duration::from_millis(1500)).await;
        assert!((surface.position() - 1.5).abs() < 1e-6);

        surface.pause();
        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        assert!((surface.position() - 1.5).abs() < 1e-6);

        surface.seek(20.0);
        assert_eq!(surface.position(), 20.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_surface_reports_end() {
        let mut surface = SimulatedSurface::new(Some(2.0));
        surface.play();
        tokio::time::advance(std::time::Duration::from_secs(3)).await;
        assert!(surface.is_ended());
        assert_eq!(surface.position(), 2.0);

        Reconciler::default().on_ended(&mut surface);
        assert!(!surface.is_ended());
        assert!(surface.position() < 0.1);
    }

    #[test]
    fn test_connection_status() {
        assert!(ConnectionStatus::Synchronized.is_synchronized());
        assert!(!ConnectionStatus::Unsynchronized.is_synchronized());
    }
}
