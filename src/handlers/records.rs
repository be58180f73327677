//! Record publishing handler.
//!
//! # Endpoint
//!
//! - `POST /topics/{topic}` - Queue a batch of records for delivery to `topic`
//!
//! # Contract
//!
//! `200 OK` means every record was accepted for asynchronous delivery, not
//! that the broker has it. Delivery outcomes only show up in the
//! `success`/`errors` counters. A body that does not decode answers
//! `500 Internal Server Error` and nothing is submitted.
//!
//! Once the producer is closed the handler answers `503 Service Unavailable`.
//! A close that lands in the middle of a batch also answers 503, but the
//! records submitted before it are still delivered and counted.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::BatchRequest;
use crate::producer::ProducerMessage;
use crate::state::AppState;

/// Queue a batch of records for `topic`.
///
/// # Request Body
///
/// ```json
/// {
///   "records": [
///     { "value": "a" },
///     { "key": "k1", "value": "b", "partition": 2 }
///   ]
/// }
/// ```
///
/// Records are submitted in listed order. The body is decoded whatever its
/// `Content-Type`.
#[instrument(skip(state, body), fields(body_size = body.len()))]
pub async fn publish_records(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> AppResult<StatusCode> {
    let batch = BatchRequest::from_slice(&body).inspect_err(|e| {
        if matches!(e, AppError::MalformedBatch(_)) {
            metrics::record_batch_rejected();
        }
    })?;
    let count = batch.len();

    if state.producer.is_closed() {
        return Err(AppError::ProducerClosed);
    }

    for record in batch.records {
        state
            .producer
            .submit(ProducerMessage::from_record(&topic, record))
            .await?;
    }

    metrics::record_records_accepted(count as u64);
    debug!(topic = %topic, count, "Batch queued for delivery");

    Ok(StatusCode::OK)
}
