//! Clock authority
//!
//! Holds the single authoritative playback clock and applies the advancement
//! and correction rules. All reads and writes go through one mutex so that
//! `position` and `last_tick` are always observed together.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant, MissedTickBehavior};

use crate::command::{validate_position, Correction};
use crate::error::{Error, Result};

/// Default period of the advancement task
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Immutable copy of the clock taken at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Seconds elapsed in the stream's own timeline
    pub position: f64,

    /// Whether the position advances with wall-clock time
    pub running: bool,

    /// Wall-clock time the snapshot was taken (epoch milliseconds on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub emitted_at: DateTime<Utc>,
}

/// Startup options for the clock
#[derive(Debug, Clone, Copy)]
pub struct ClockOptions {
    /// Loop length in seconds; `None` lets the position grow unbounded
    pub duration: Option<f64>,

    /// Whether the clock starts advancing immediately
    pub start_running: bool,

    /// Initial position in seconds
    pub start_position: f64,
}

impl Default for ClockOptions {
    fn default() -> Self {
        Self {
            duration: None,
            start_running: true,
            start_position: 0.0,
        }
    }
}

/// Raw clock state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockState {
    /// Seconds elapsed in the stream's timeline, always `>= 0`
    pub position: f64,

    /// Whether `position` advances
    pub running: bool,

    /// Last time `position` was advanced or explicitly set
    pub last_tick: Instant,

    /// Optional loop length; `position` stays in `[0, duration)`
    pub duration: Option<f64>,
}

impl ClockState {
    fn new(options: ClockOptions, now: Instant) -> Result<Self> {
        let duration = validate_duration(options.duration)?;
        let mut position = validate_position(options.start_position)?;
        if duration.is_some_and(|d| position >= d) {
            position = 0.0;
        }

        Ok(Self {
            position,
            running: options.start_running,
            last_tick: now,
            duration,
        })
    }

    /// Advance the position by the wall time elapsed since `last_tick`
    ///
    /// While paused only `last_tick` moves, so paused time is never credited.
    /// A `now` earlier than `last_tick` counts as zero elapsed.
    pub fn advance(&mut self, now: Instant) {
        if now <= self.last_tick {
            return;
        }

        if self.running {
            let elapsed = now.duration_since(self.last_tick).as_secs_f64();
            self.position += elapsed;
            if self.duration.is_some_and(|d| self.position >= d) {
                self.position = 0.0;
            }
        }

        self.last_tick = now;
    }

    /// Apply a correction
    ///
    /// Validation happens before any field is touched.
    pub fn apply(&mut self, correction: Correction, now: Instant) -> Result<()> {
        if let Some(p) = correction.position {
            let p = validate_position(p)?;
            if let Some(d) = self.duration {
                if p >= d {
                    return Err(Error::InvalidCommand(format!(
                        "position {} is outside the loop duration {}",
                        p, d
                    )));
                }
            }
        }

        match (correction.position, correction.running) {
            (Some(p), running) => {
                self.position = p;
                if let Some(r) = running {
                    self.running = r;
                }
            }
            (None, Some(r)) => {
                // Credit time played under the old run state before switching.
                self.advance(now);
                self.running = r;
            }
            (None, None) => return Ok(()),
        }

        self.last_tick = self.last_tick.max(now);
        Ok(())
    }

    /// Take a snapshot stamped with the current wall-clock time
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            position: self.position,
            running: self.running,
            emitted_at: Utc::now(),
        }
    }
}

fn validate_duration(duration: Option<f64>) -> Result<Option<f64>> {
    match duration {
        Some(d) if !d.is_finite() || d <= 0.0 => Err(Error::Config(format!(
            "duration must be a positive finite number of seconds, got {}",
            d
        ))),
        other => Ok(other),
    }
}

/// Single source of truth for playback position and run state
///
/// Share it by `Arc` between the advancement task, the distribution service
/// and the correction endpoint.
#[derive(Debug)]
pub struct ClockAuthority {
    state: Mutex<ClockState>,
}

impl ClockAuthority {
    /// Create a clock starting now
    pub fn new(options: ClockOptions) -> Result<Self> {
        Self::new_at(options, Instant::now())
    }

    /// Create a clock whose first tick is `now`
    pub fn new_at(options: ClockOptions, now: Instant) -> Result<Self> {
        Ok(Self {
            state: Mutex::new(ClockState::new(options, now)?),
        })
    }

    /// Atomic read of the clock
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().snapshot()
    }

    /// Copy of the raw state
    pub fn state(&self) -> ClockState {
        *self.state.lock()
    }

    /// Advance using the current time
    pub fn advance(&self) {
        self.advance_at(Instant::now());
    }

    /// Advance as if the current time were `now`
    pub fn advance_at(&self, now: Instant) {
        self.state.lock().advance(now);
    }

    /// Apply a correction using the current time
    pub fn correct(&self, correction: Correction) -> Result<Snapshot> {
        self.correct_at(correction, Instant::now())
    }

    /// Apply a correction as if the current time were `now`
    ///
    /// Returns the resulting snapshot; on error the state is unchanged.
    pub fn correct_at(&self, correction: Correction, now: Instant) -> Result<Snapshot> {
        let mut state = self.state.lock();
        state.apply(correction, now)?;
        let snapshot = state.snapshot();
        drop(state);

        tracing::info!(
            position = snapshot.position,
            running = snapshot.running,
            "Clock corrected"
        );
        Ok(snapshot)
    }

    /// Configure or clear the loop duration
    ///
    /// A position already at or past the new duration wraps to zero.
    pub fn set_duration(&self, duration: Option<f64>) -> Result<()> {
        let duration = validate_duration(duration)?;
        let mut state = self.state.lock();
        state.duration = duration;
        if duration.is_some_and(|d| state.position >= d) {
            state.position = 0.0;
        }
        Ok(())
    }

    /// Run the advancement task until shutdown
    ///
    /// Ticks regardless of whether any viewer is connected.
    pub async fn run_advance_loop(
        self: Arc<Self>,
        tick_interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            "Clock advance task started (interval: {}ms)",
            tick_interval.as_millis()
        );

        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.advance();
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Clock advance task shutting down");
                    break;
                }
            }
        }
    }
}
