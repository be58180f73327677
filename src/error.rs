use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Connection Errors
///
/// Connection-related errors are split into specific variants so the Iggy
/// client can decide when to reconnect:
///
/// - `ConnectionFailed` - Initial connection or reconnection failed
/// - `Disconnected` - Lost connection during operation (triggers reconnection)
/// - `ConnectionReset` - Connection was reset by peer (triggers reconnection)
///
/// # Ingress Errors
///
/// `MalformedBatch` is kept apart from `BadRequest` so that decode failures on
/// `POST /topics/{topic}` keep their historical 500 status while still being
/// classified as client data problems in logs and metrics.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to connect to Iggy server: {0}")]
    ConnectionFailed(String),

    #[error("Disconnected from Iggy server: {0}")]
    Disconnected(String),

    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    #[error("Stream operation failed: {0}")]
    StreamError(String),

    #[error("Topic operation failed: {0}")]
    TopicError(String),

    #[error("Failed to send messages: {0}")]
    SendError(String),

    #[error("Malformed record batch: {0}")]
    MalformedBatch(String),

    #[error("Producer is closed")]
    ProducerClosed,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Operation timed out: {0}")]
    OperationTimeout(String),

    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),
}

impl AppError {
    /// Whether a failed delivery attempt is worth repeating.
    ///
    /// Broker-side and transport failures are transient; invalid names and
    /// other request problems will fail the same way on every attempt.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            AppError::ConnectionFailed(_)
                | AppError::Disconnected(_)
                | AppError::ConnectionReset(_)
                | AppError::StreamError(_)
                | AppError::TopicError(_)
                | AppError::SendError(_)
                | AppError::OperationTimeout(_)
                | AppError::CircuitOpen(_)
        )
    }
}

/// Error response body for JSON endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            // The records endpoint answers with bare status codes
            AppError::MalformedBatch(reason) => {
                tracing::warn!(reason = %reason, "Rejected malformed record batch");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            AppError::ProducerClosed => {
                tracing::warn!("Rejected batch, producer is shutting down");
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }

            AppError::ConnectionFailed(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "connection_failed",
                "Message broker is temporarily unavailable. Please try again later.",
            ),
            AppError::Disconnected(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "disconnected",
                "Connection to message broker was lost. Please try again.",
            ),
            AppError::ConnectionReset(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "connection_reset",
                "Connection to message broker was reset. Please try again.",
            ),
            AppError::StreamError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "stream_error",
                "Stream operation failed. Please contact support if the issue persists.",
            ),
            AppError::TopicError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "topic_error",
                "Topic operation failed. Please contact support if the issue persists.",
            ),
            AppError::SendError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "send_error",
                "Failed to send messages. Please try again.",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists.",
            ),
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Service configuration error. Please contact support.",
            ),
            AppError::OperationTimeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                "Operation timed out. Please try again.",
            ),
            AppError::CircuitOpen(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "circuit_open",
                "Message broker is unavailable. Please try again later.",
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.as_str()),
        };

        // Full details stay server-side
        tracing::error!(error = %self, "Request failed");

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
