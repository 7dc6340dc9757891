//! HTTP transport error types

use thiserror::Error;

/// HTTP transport error types
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Server rejected a correction
    #[error("Correction rejected ({kind}): {message}")]
    Rejected {
        /// Machine-readable error tag from the server
        kind: String,
        /// Human-readable reason
        message: String,
    },

    /// Clock-level error (malformed message, disconnect)
    #[error(transparent)]
    Clock(#[from] playclock_core::Error),
}

impl Error {
    /// True when the subscription is gone and a resubscribe is needed
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Error::Clock(playclock_core::Error::StreamDisconnected(_))
                | Error::ConnectionError(_)
                | Error::HttpError(_)
        )
    }
}

/// Result type for HTTP transport operations
pub type Result<T> = std::result::Result<T, Error>;
