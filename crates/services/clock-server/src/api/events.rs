//! SSE subscription endpoint
//!
//! Streams clock snapshots to a viewer via Server-Sent Events. The first
//! event is the snapshot taken at connection time; later events follow the
//! broadcast cadence until either side goes away.

use axum::{
    extract::State,
    http::HeaderName,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::AppState;
use crate::distribution::ViewerStream;
use playclock_core::Snapshot;

/// Disables response buffering in nginx-style reverse proxies
const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// SSE snapshot stream
///
/// GET /api/sync
pub async fn events_stream(State(state): State<AppState>) -> impl IntoResponse {
    let viewer = state.distributor.connect();
    let stream = EventStream::new(viewer);

    (
        [(X_ACCEL_BUFFERING, "no")],
        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(state.config.distribution.keep_alive())
                .text("keep-alive"),
        ),
    )
}

/// Wrapper around a viewer's queue that converts snapshots to SSE events
///
/// Dropping it (client went away) drops the inner [`ViewerStream`], which
/// removes the viewer from the registry.
struct EventStream {
    inner: ViewerStream,
}

impl EventStream {
    fn new(inner: ViewerStream) -> Self {
        Self { inner }
    }
}

impl Stream for EventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        match polled {
            Poll::Ready(Some(snapshot)) => Poll::Ready(Some(Ok(snapshot_event(&snapshot)))),
            Poll::Ready(None) => {
                tracing::debug!(viewer_id = %self.inner.id(), "SSE stream closed (viewer removed)");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Encode a snapshot as one SSE `data:` event
fn snapshot_event(snapshot: &Snapshot) -> Event {
    Event::default().data(snapshot_payload(snapshot).to_string())
}

/// Wire form of a snapshot; built directly since numbers and booleans cannot fail to encode
fn snapshot_payload(snapshot: &Snapshot) -> serde_json::Value {
    serde_json::json!({
        "position": snapshot.position,
        "running": snapshot.running,
        "emittedAt": snapshot.emitted_at.timestamp_millis(),
    })
}
