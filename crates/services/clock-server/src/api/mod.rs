//! HTTP API for the PlayClock server
//!
//! - `GET /api/sync` - SSE snapshot stream
//! - `POST /api/sync` - Apply a correction (seek / pause / play)
//! - `GET /api/sync/state` - One-shot snapshot
//! - `GET /health` - Liveness
//! - `GET /metrics` - Server metrics

pub mod control;
pub mod events;

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::distribution::Distributor;
use crate::metrics::{Metrics, MetricsSnapshot};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Snapshot fan-out (also owns the clock handle)
    pub distributor: Arc<Distributor>,
    /// Service metrics
    pub metrics: Arc<Metrics>,
    /// Service configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(distributor: Arc<Distributor>, metrics: Arc<Metrics>, config: Arc<Config>) -> Self {
        Self {
            distributor,
            metrics,
            config,
        }
    }
}

/// Build the HTTP API router
pub fn build_router(state: AppState) -> Router {
    // Viewers are served from arbitrary origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/sync",
            get(events::events_stream).post(control::apply_correction),
        )
        .route("/api/sync/state", get(control::current_state))
        // Health and metrics
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Metrics endpoint
async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use playclock_core::{ClockAuthority, ClockOptions};
    use tower::ServiceExt;

    #[test]
    fn test_app_state_creation() {
        let config = Arc::new(Config::default());
        let metrics = Arc::new(Metrics::new());
        let clock = Arc::new(ClockAuthority::new(ClockOptions::default()).unwrap());
        let distributor = Arc::new(Distributor::new(
            clock,
            metrics.clone(),
            &config.distribution,
        ));
        let state = AppState::new(distributor, metrics, config);

        assert_eq!(state.config.server.port, 3000);
        assert_eq!(state.distributor.viewer_count(), 0);
    }

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }

    fn test_router() -> Router {
        let config = Arc::new(Config::default());
        let metrics = Arc::new(Metrics::new());
        let clock = Arc::new(
            ClockAuthority::new(ClockOptions {
                start_running: false,
                ..Default::default()
            })
            .unwrap(),
        );
        let distributor = Arc::new(Distributor::new(clock, metrics.clone(), &config.distribution));
        build_router(AppState::new(distributor, metrics, config))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_router_correction_then_state() {
        let app = test_router();

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/sync")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"position": 12.5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["position"], 12.5);
        assert_eq!(body["running"], false);

        let response = app
            .oneshot(Request::get("/api/sync/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["position"], 12.5);
        assert!(body["emittedAt"].is_i64());
    }

    #[tokio::test]
    async fn test_router_rejects_invalid_correction() {
        let response = test_router()
            .oneshot(
                Request::post("/api/sync")
                    .body(Body::from(r#"{"position": -3}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "invalid_command");
    }

    #[tokio::test]
    async fn test_router_metrics() {
        let response = test_router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["active_viewers"], 0);
    }
}
