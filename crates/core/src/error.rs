//! Error types for PlayClock core

use thiserror::Error;

/// Result type alias for PlayClock core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while driving or consuming the clock
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed correction payload; the clock state is left untouched
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Sending to a single viewer failed; only that viewer is affected
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// A pushed snapshot could not be parsed by a subscriber
    #[error("Malformed upstream message: {0}")]
    MalformedUpstreamMessage(String),

    /// The subscription stream ended or broke
    #[error("Stream disconnected: {0}")]
    StreamDisconnected(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Short machine-readable tag used in HTTP error bodies and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidCommand(_) => "invalid_command",
            Error::TransportFailure(_) => "transport_failure",
            Error::MalformedUpstreamMessage(_) => "malformed_upstream_message",
            Error::StreamDisconnected(_) => "stream_disconnected",
            Error::Config(_) => "config",
        }
    }
}
