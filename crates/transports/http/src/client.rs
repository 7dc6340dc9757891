//! HTTP client for a PlayClock server
//!
//! Covers both external interfaces of the service:
//!
//! - Corrections via `POST /api/sync` (request/response)
//! - The snapshot subscription via `GET /api/sync` (Server-Sent Events)
//!
//! # Usage
//!
//! ```ignore
//! use playclock_http::ClockClient;
//! use playclock_core::Correction;
//!
//! let client = ClockClient::new("http://localhost:3000")?;
//! let confirmed = client.correct(Correction::seek(10.0)).await?;
//!
//! let mut subscription = client.subscribe().await?;
//! while let Ok(snapshot) = subscription.next().await {
//!     println!("{} ({})", snapshot.position, snapshot.running);
//! }
//! ```

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::sse::{SseEvent, SseParser};
use playclock_core::{Correction, CorrectionResponse, Snapshot};

/// Request timeout for commands and one-shot reads
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect timeout for the long-lived subscription
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time without any bytes (snapshots or keep-alives) before a
/// subscription is considered dead
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body returned by the server on rejection
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Client for one PlayClock server
#[derive(Debug, Clone)]
pub struct ClockClient {
    /// Base URL (e.g., "http://localhost:3000")
    base_url: String,

    /// Client for request/response calls (bounded total time)
    client: reqwest::Client,

    /// Client for the subscription (no total timeout)
    stream_client: reqwest::Client,

    /// Idle limit applied to subscriptions
    idle_timeout: Duration,
}

impl ClockClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or not http(s).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        if base_url.is_empty() {
            return Err(Error::ConnectionError(
                "HTTP base_url cannot be empty".to_string(),
            ));
        }

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::ConnectionError(format!(
                "HTTP base_url must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::ConnectionError(format!("Failed to create HTTP client: {}", e)))?;

        let stream_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::ConnectionError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            stream_client,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Override the subscription idle timeout
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sync_url(&self) -> String {
        format!("{}/api/sync", self.base_url)
    }

    /// Apply a correction and return the server's confirmation
    pub async fn correct(&self, correction: Correction) -> Result<CorrectionResponse> {
        let response = self
            .client
            .post(self.sync_url())
            .json(&correction)
            .send()
            .await
            .map_err(|e| Error::RequestFailed(format!("Correction request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<CorrectionResponse>().await?);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => Err(Error::Rejected {
                kind: body.error,
                message: body.message,
            }),
            Err(_) => Err(Error::RequestFailed(format!(
                "HTTP {} {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                text
            ))),
        }
    }

    /// Seek to `position` seconds
    pub async fn seek(&self, position: f64) -> Result<CorrectionResponse> {
        self.correct(Correction::seek(position)).await
    }

    /// Resume the clock
    pub async fn play(&self) -> Result<CorrectionResponse> {
        self.correct(Correction::play()).await
    }

    /// Pause the clock
    pub async fn pause(&self) -> Result<CorrectionResponse> {
        self.correct(Correction::pause()).await
    }

    /// Fetch the current snapshot without subscribing
    pub async fn state(&self) -> Result<Snapshot> {
        let url = format!("{}/api/sync/state", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::RequestFailed(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(response.json::<Snapshot>().await?)
    }

    /// Check if the server is healthy
    ///
    /// Unreachable or slow servers report `false` rather than an error.
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        match tokio::time::timeout(Duration::from_secs(5), self.client.get(&url).send()).await {
            Ok(Ok(response)) => Ok(response.status().is_success()),
            Ok(Err(e)) => {
                tracing::warn!("Health check failed for {}: {}", self.base_url, e);
                Ok(false)
            }
            Err(_) => {
                tracing::warn!("Health check timeout for {}", self.base_url);
                Ok(false)
            }
        }
    }

    /// Open the snapshot subscription
    pub async fn subscribe(&self) -> Result<Subscription> {
        let response = self
            .stream_client
            .get(self.sync_url())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::ConnectionError(format!("Failed to open subscription: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::ConnectionError(format!(
                "Subscription refused: HTTP {}",
                status.as_u16()
            )));
        }

        tracing::debug!(url = %self.sync_url(), "Subscription opened");
        Ok(Subscription::new(
            Box::pin(response.bytes_stream()),
            self.idle_timeout,
        ))
    }
}

type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// A live snapshot subscription
///
/// Malformed messages are discarded and never end the subscription; any
/// transport error, idle timeout or end of body is reported as
/// [`playclock_core::Error::StreamDisconnected`].
pub struct Subscription {
    body: BodyStream,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
    idle_timeout: Duration,
    last_activity: Instant,
    malformed: u64,
    closed: bool,
}

impl Subscription {
    fn new(body: BodyStream, idle_timeout: Duration) -> Self {
        Self {
            body,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            idle_timeout,
            last_activity: Instant::now(),
            malformed: 0,
            closed: false,
        }
    }

    /// Build a subscription over any byte stream
    pub fn from_stream<S>(body: S, idle_timeout: Duration) -> Self
    where
        S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    {
        Self::new(Box::pin(body), idle_timeout)
    }

    /// Messages discarded because they did not parse
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    /// Wait for the next snapshot
    ///
    /// Cancel safe: dropping the future loses no buffered message, and the
    /// idle deadline is measured from the last received bytes.
    pub async fn next(&mut self) -> Result<Snapshot> {
        loop {
            while let Some(event) = self.pending.pop_front() {
                match serde_json::from_str::<Snapshot>(&event.data) {
                    Ok(snapshot) => return Ok(snapshot),
                    Err(e) => {
                        self.malformed += 1;
                        let err = playclock_core::Error::MalformedUpstreamMessage(e.to_string());
                        tracing::warn!(error = %err, "Discarding snapshot");
                    }
                }
            }

            if self.closed {
                return Err(disconnected("subscription already closed"));
            }

            let deadline = self.last_activity + self.idle_timeout;
            match tokio::time::timeout_at(deadline, self.body.next()).await {
                Ok(Some(Ok(chunk))) => {
                    self.last_activity = Instant::now();
                    self.pending.extend(self.parser.push(&chunk));
                }
                Ok(Some(Err(e))) => {
                    self.closed = true;
                    return Err(disconnected(&e.to_string()));
                }
                Ok(None) => {
                    self.closed = true;
                    return Err(disconnected("server closed the stream"));
                }
                Err(_) => {
                    self.closed = true;
                    return Err(disconnected(&format!(
                        "no data for {}s",
                        self.idle_timeout.as_secs()
                    )));
                }
            }
        }
    }
}

fn disconnected(reason: &str) -> Error {
    Error::Clock(playclock_core::Error::StreamDisconnected(reason.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn body(chunks: Vec<&'static str>) -> impl Stream<Item = reqwest::Result<Bytes>> + Send {
        stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes()))),
        )
    }

    #[test]
    fn test_create_client() {
        tokio_test::assert_ok!(ClockClient::new("http://localhost:3000"));
        tokio_test::assert_ok!(ClockClient::new("https://clock.example.com/"));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = ClockClient::new("http://localhost:3000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_empty_url_error() {
        assert!(ClockClient::new("").is_err());
    }

    #[test]
    fn test_invalid_url_scheme() {
        tokio_test::assert_err!(ClockClient::new("ftp://invalid.com"));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let client = ClockClient::new("http://127.0.0.1:9").unwrap();
        let result = client.health_check().await;
        assert!(result.is_ok());
        assert!(!result.unwrap());
    }

    #[tokio::test]
    async fn test_subscription_parses_snapshots() {
        let mut sub = Subscription::from_stream(
            body(vec![
                "data: {\"position\":1.5,\"running\":true,\"emittedAt\":1700000000000}\n\n",
                ":keep-alive\n\n",
                "data: {\"position\":2.5,\"running\":false,\"emittedAt\":1700000001000}\n\n",
            ]),
            DEFAULT_IDLE_TIMEOUT,
        );

        let first = sub.next().await.unwrap();
        assert_eq!(first.position, 1.5);
        assert!(first.running);

        let second = sub.next().await.unwrap();
        assert_eq!(second.position, 2.5);
        assert!(!second.running);
    }

    #[tokio::test]
    async fn test_malformed_message_is_skipped() {
        let mut sub = Subscription::from_stream(
            body(vec![
                "data: not json\n\n",
                "data: {\"position\":\"x\"}\n\n",
                "data: {\"position\":4.0,\"running\":true,\"emittedAt\":1700000000000}\n\n",
            ]),
            DEFAULT_IDLE_TIMEOUT,
        );

        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.position, 4.0);
        assert_eq!(sub.malformed_count(), 2);
    }

    #[tokio::test]
    async fn test_end_of_body_is_disconnect() {
        let mut sub = Subscription::from_stream(body(vec![]), DEFAULT_IDLE_TIMEOUT);
        let err = sub.next().await.unwrap_err();
        assert!(err.is_disconnect());
        assert!(sub.next().await.unwrap_err().is_disconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_subscription_times_out() {
        let mut sub = Subscription::from_stream(
            stream::pending::<reqwest::Result<Bytes>>(),
            Duration::from_secs(3),
        );
        let err = sub.next().await.unwrap_err();
        assert!(err.is_disconnect());
        assert!(err.to_string().contains("no data"));
    }
}
