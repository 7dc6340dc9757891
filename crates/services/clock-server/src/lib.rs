//! PlayClock Server
//!
//! Holds the authoritative playback clock for one media stream and pushes it
//! to every connected viewer over Server-Sent Events, so all viewers render
//! the same moment of the stream within a bounded drift.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                          playclock-server                          │
//! ├────────────────────────────────────────────────────────────────────┤
//! │                                                                    │
//! │  ┌──────────────────┐  POST /api/sync      ┌──────────────────┐    │
//! │  │  HTTP API Server │─────────────────────▶│  ClockAuthority  │    │
//! │  │  (axum)          │  correct()           │  (mutex state)   │◀─┐ │
//! │  └────────┬─────────┘                      └────────▲─────────┘  │ │
//! │           │ GET /api/sync                           │ snapshot() │ │
//! │           ▼                                         │            │ │
//! │  ┌──────────────────┐   try_send per tick  ┌────────┴─────────┐  │ │
//! │  │  ViewerStream ×N │◀─────────────────────│  Distributor     │  │ │
//! │  │  (bounded mpsc)  │                      │  (broadcast 1s)  │  │ │
//! │  └──────────────────┘                      └──────────────────┘  │ │
//! │                                            advance task (100ms) ─┘ │
//! └────────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod distribution;
pub mod metrics;
pub mod server;
