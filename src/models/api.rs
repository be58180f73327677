use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// Whether the Iggy connection is currently up
    pub broker_connected: bool,
    /// Application version
    pub version: String,
    /// Time of the check
    pub timestamp: DateTime<Utc>,
}

/// Delivery statistics response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Messages acknowledged by the broker
    pub success: u64,
    /// Messages the broker could not take after retries
    pub errors: u64,
    /// Messages accepted for asynchronous delivery
    pub submitted: u64,
    /// Accepted messages without an outcome yet
    pub in_flight: u64,
    /// Application uptime in seconds
    pub uptime_seconds: u64,
}
