//! PlayClock core
//!
//! One authoritative playback clock for a single media stream, plus the
//! types every participant speaks:
//!
//! - [`clock`]: the clock authority (advance on a fixed tick, apply corrections)
//! - [`command`]: correction payloads and their validation
//! - [`reconcile`]: how a viewer brings its local renderer in line with a snapshot
//! - [`error`]: the shared error taxonomy
//!
//! ```ignore
//! use playclock_core::{ClockAuthority, ClockOptions, Correction};
//!
//! let clock = ClockAuthority::new(ClockOptions::default())?;
//! clock.advance();
//! let snapshot = clock.correct(Correction::seek(10.0))?;
//! assert_eq!(snapshot.position, 10.0);
//! ```

pub mod clock;
pub mod command;
pub mod error;
pub mod reconcile;

pub use clock::{ClockAuthority, ClockOptions, ClockState, Snapshot, DEFAULT_TICK_INTERVAL};
pub use command::{Correction, CorrectionResponse};
pub use error::{Error, Result};
pub use reconcile::{
    ConnectionStatus, PlaybackSurface, ReconcileOutcome, Reconciler, RunAction, SimulatedSurface,
    DEFAULT_DRIFT_TOLERANCE,
};
