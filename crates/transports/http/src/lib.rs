//! HTTP/SSE client side of PlayClock
//!
//! Everything a participant needs to talk to a PlayClock server:
//!
//! - **Corrections**: `POST /api/sync` via [`ClockClient::correct`]
//! - **Subscription**: `GET /api/sync` (Server-Sent Events) via [`ClockClient::subscribe`]
//! - **Viewer**: [`Viewer`] follows the subscription and reconciles a local
//!   [`PlaybackSurface`](playclock_core::PlaybackSurface), resubscribing on loss
//!
//! # Usage
//!
//! ```ignore
//! use playclock_http::{ClockClient, Viewer};
//! use playclock_core::SimulatedSurface;
//!
//! let client = ClockClient::new("http://localhost:3000")?;
//! client.seek(10.0).await?;
//!
//! let viewer = Viewer::new(client);
//! let mut surface = SimulatedSurface::new(Some(120.0));
//! viewer.run(&mut surface, tokio::signal::ctrl_c().map(|_| ())).await;
//! ```

pub mod client;
pub mod error;
pub mod sse;
pub mod viewer;

// Re-export main types
pub use client::{ClockClient, Subscription};
pub use error::{Error, Result};
pub use viewer::{Viewer, ViewerStats};
