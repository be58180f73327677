//! Health, readiness, and delivery statistics endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check with Iggy connection status
//! - `GET /ready` - Readiness probe; 503 while disconnected or shutting down
//! - `GET /stats` - Delivery counters

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::instrument;

use crate::models::{HealthResponse, StatsResponse};
use crate::state::AppState;

/// Health check endpoint.
///
/// Always returns 200 OK; a lost broker connection shows as `degraded`.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "broker_connected": true,
///   "version": "0.1.0",
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let broker_connected = state.connection.is_connected();

    Json(HealthResponse {
        status: if broker_connected {
            "healthy"
        } else {
            "degraded"
        }
        .to_string(),
        broker_connected,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint.
///
/// Ready while the broker is connected and the producer accepts messages.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if state.connection.is_connected() && !state.producer.is_closed() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Delivery statistics.
///
/// # Response Body
///
/// ```json
/// {
///   "success": 1200,
///   "errors": 3,
///   "submitted": 1210,
///   "in_flight": 7,
///   "uptime_seconds": 3600
/// }
/// ```
#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let counters = state.registry.snapshot();
    let submitted = state.producer.submitted();

    Json(StatsResponse {
        success: counters.success,
        errors: counters.errors,
        submitted,
        in_flight: submitted.saturating_sub(counters.total()),
        uptime_seconds: state.uptime_seconds(),
    })
}
