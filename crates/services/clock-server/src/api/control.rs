//! Correction and state endpoints
//!
//! Corrections are applied synchronously and the resulting snapshot is
//! returned to the caller; other viewers pick the change up on their next
//! broadcast tick.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::AppState;
use playclock_core::{Correction, CorrectionResponse, Error, Snapshot};

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    fn from_error(e: &Error) -> Self {
        Self {
            success: false,
            error: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

/// Parse a raw request body into a validated correction
pub fn parse_correction(body: &[u8]) -> Result<Correction, Error> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| Error::InvalidCommand(format!("body is not valid JSON: {}", e)))?;
    Correction::from_json(&value)
}

/// Apply a correction
///
/// POST /api/sync
pub async fn apply_correction(State(state): State<AppState>, body: Bytes) -> Response {
    let result = parse_correction(&body)
        .and_then(|correction| state.distributor.clock().correct(correction));

    match result {
        Ok(snapshot) => {
            state.metrics.correction_applied();
            (
                StatusCode::OK,
                Json(CorrectionResponse {
                    success: true,
                    position: snapshot.position,
                    running: snapshot.running,
                }),
            )
                .into_response()
        }
        Err(e) => {
            state.metrics.correction_rejected();
            tracing::warn!(error = %e, "Rejected correction");
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::from_error(&e))).into_response()
        }
    }
}

/// Current snapshot
///
/// GET /api/sync/state
pub async fn current_state(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.distributor.clock().snapshot())
}
