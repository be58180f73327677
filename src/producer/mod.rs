//! Asynchronous producer with delivery outcome streams.
//!
//! Request handlers hand messages to a [`ProducerHandle`] and return without
//! waiting for the broker. A single dispatcher task batches the messages,
//! delivers them through a [`DeliveryTransport`], and reports one outcome per
//! message on either the [`Successes`] or the [`Failures`] stream.
//!
//! ```text
//!  handlers ──submit──► [bounded queue] ──► Dispatcher ──deliver──► broker
//!                                              │
//!                              ┌───────────────┴───────────────┐
//!                              ▼                               ▼
//!                          Successes                       Failures
//! ```
//!
//! # Backpressure
//!
//! The submission queue holds `channel_capacity` messages. When the broker
//! falls behind, `submit` waits for room, which slows down request handling.
//!
//! # Shutdown
//!
//! [`ProducerHandle::close`] stops intake. The dispatcher then drains the
//! queue, flushes what is buffered and exits; both outcome streams end once
//! every accepted message has its outcome.

mod dispatcher;
mod message;
mod transport;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use dispatcher::Dispatcher;

pub use message::{DeliveryFailure, DeliverySuccess, ProducerMessage, Route};
pub use transport::DeliveryTransport;

/// Batching, queueing and retry parameters.
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    /// Buffered messages that force a flush
    pub flush_messages: usize,
    /// Longest time a message stays buffered
    pub flush_interval: Duration,
    /// Submission queue depth
    pub channel_capacity: usize,
    /// Retries after a transient delivery failure
    pub max_retries: u32,
    /// Pause between retries
    pub retry_backoff: Duration,
    /// Longest a single delivery attempt may take, reconnection included
    pub delivery_timeout: Duration,
}

impl ProducerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            flush_messages: config.producer_flush_messages,
            flush_interval: config.producer_flush_interval,
            channel_capacity: config.producer_channel_capacity,
            max_retries: config.producer_max_retries,
            retry_backoff: config.producer_retry_backoff,
            delivery_timeout: config.producer_delivery_timeout,
        }
    }
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

const MIN_DURATION: Duration = Duration::from_millis(1);

/// Entry point for starting the producer pipeline.
pub struct AsyncProducer;

impl AsyncProducer {
    /// Spawn the dispatcher on `tracker` and return the submission handle
    /// together with the outcome streams.
    pub fn start<T: DeliveryTransport>(
        transport: T,
        mut settings: ProducerSettings,
        tracker: &TaskTracker,
    ) -> (ProducerHandle, DeliveryReports) {
        // Zero values would make mpsc::channel and time::interval panic
        settings.flush_interval = settings.flush_interval.max(MIN_DURATION);
        settings.delivery_timeout = settings.delivery_timeout.max(MIN_DURATION);
        let (input_tx, input_rx) = mpsc::channel(settings.channel_capacity.max(1));
        let (success_tx, success_rx) = mpsc::unbounded_channel();
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        let closing = CancellationToken::new();

        info!(
            flush_messages = settings.flush_messages,
            flush_interval_ms = settings.flush_interval.as_millis() as u64,
            channel_capacity = settings.channel_capacity,
            max_retries = settings.max_retries,
            delivery_timeout_ms = settings.delivery_timeout.as_millis() as u64,
            "Starting async producer"
        );

        let dispatcher = Dispatcher::new(
            transport,
            settings,
            input_rx,
            closing.clone(),
            success_tx,
            failure_tx,
        );
        tracker.spawn(dispatcher.run());

        let handle = ProducerHandle {
            input: input_tx,
            closing,
            submitted: Arc::new(AtomicU64::new(0)),
        };
        let reports = DeliveryReports {
            successes: Successes(success_rx),
            failures: Failures(failure_rx),
        };

        (handle, reports)
    }
}

/// Cloneable submission side of the producer.
///
/// # Counter Memory Ordering
///
/// `submitted` uses `Ordering::Relaxed`: it is a monotonically increasing
/// statistic and nothing synchronizes on its value.
#[derive(Clone)]
pub struct ProducerHandle {
    input: mpsc::Sender<ProducerMessage>,
    closing: CancellationToken,
    submitted: Arc<AtomicU64>,
}

impl ProducerHandle {
    /// Queue a message for asynchronous delivery.
    ///
    /// Waits while the submission queue is full. Success means the message
    /// was accepted, not that the broker has it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ProducerClosed` once the producer has been closed.
    pub async fn submit(&self, message: ProducerMessage) -> AppResult<()> {
        if self.closing.is_cancelled() {
            return Err(AppError::ProducerClosed);
        }

        // Counted before sending so outcomes never outnumber submissions
        self.submitted.fetch_add(1, Ordering::Relaxed);
        if self.input.send(message).await.is_err() {
            self.submitted.fetch_sub(1, Ordering::Relaxed);
            return Err(AppError::ProducerClosed);
        }

        Ok(())
    }

    /// Stop accepting messages and let the dispatcher drain. Idempotent.
    pub fn close(&self) {
        if !self.closing.is_cancelled() {
            debug!("Closing async producer");
            self.closing.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Total messages accepted for delivery.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

/// Both outcome streams of a producer.
pub struct DeliveryReports {
    pub successes: Successes,
    pub failures: Failures,
}

/// Stream of broker acknowledgments. Ends when the producer is closed and drained.
pub struct Successes(mpsc::UnboundedReceiver<DeliverySuccess>);

impl Successes {
    pub async fn next(&mut self) -> Option<DeliverySuccess> {
        self.0.recv().await
    }
}

/// Stream of undeliverable messages. Ends when the producer is closed and drained.
pub struct Failures(mpsc::UnboundedReceiver<DeliveryFailure>);

impl Failures {
    pub async fn next(&mut self) -> Option<DeliveryFailure> {
        self.0.recv().await
    }
}
