//! Background task that batches submitted messages and delivers them.

use std::collections::HashMap;
use std::mem;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{AppError, AppResult};

use super::ProducerSettings;
use super::message::{DeliveryFailure, DeliverySuccess, ProducerMessage, Route};
use super::transport::DeliveryTransport;

/// Owns the receiving end of the submission queue and both outcome senders.
///
/// Messages are buffered per `(topic, route)` and flushed when
/// `flush_messages` are pending or the flush interval elapses. Dropping the
/// dispatcher drops the outcome senders, which ends both outcome streams.
///
/// Every delivery attempt is bounded by `delivery_timeout`, so a transport
/// that never returns costs at most `max_retries + 1` timeouts per batch.
pub(super) struct Dispatcher<T> {
    transport: T,
    settings: ProducerSettings,
    input: mpsc::Receiver<ProducerMessage>,
    closing: CancellationToken,
    successes: mpsc::UnboundedSender<DeliverySuccess>,
    failures: mpsc::UnboundedSender<DeliveryFailure>,
    pending: HashMap<(String, Route), Vec<ProducerMessage>>,
    buffered: usize,
}

impl<T: DeliveryTransport> Dispatcher<T> {
    pub(super) fn new(
        transport: T,
        settings: ProducerSettings,
        input: mpsc::Receiver<ProducerMessage>,
        closing: CancellationToken,
        successes: mpsc::UnboundedSender<DeliverySuccess>,
        failures: mpsc::UnboundedSender<DeliveryFailure>,
    ) -> Self {
        Self {
            transport,
            settings,
            input,
            closing,
            successes,
            failures,
            pending: HashMap::new(),
            buffered: 0,
        }
    }

    pub(super) async fn run(mut self) {
        let mut ticker = interval(self.settings.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Skip the first immediate tick

        loop {
            tokio::select! {
                biased;

                _ = self.closing.cancelled() => {
                    debug!("Producer closing, draining submission queue");
                    break;
                }
                received = self.input.recv() => match received {
                    Some(message) => self.buffer(message).await,
                    None => {
                        debug!("All producer handles dropped");
                        break;
                    }
                },
                _ = ticker.tick() => self.flush().await,
            }
        }

        // Refuse new submissions but keep everything already queued
        self.input.close();
        while let Some(message) = self.input.recv().await {
            self.buffer(message).await;
        }
        self.flush().await;

        debug!("Producer dispatcher stopped");
    }

    async fn buffer(&mut self, message: ProducerMessage) {
        let slot = (message.topic.clone(), message.route());
        self.pending.entry(slot).or_default().push(message);
        self.buffered += 1;

        if self.buffered >= self.settings.flush_messages {
            self.flush().await;
        }
    }

    async fn flush(&mut self) {
        if self.buffered == 0 {
            return;
        }

        let batches = mem::take(&mut self.pending);
        trace!(
            messages = self.buffered,
            batches = batches.len(),
            "Flushing producer buffer"
        );
        self.buffered = 0;

        for ((topic, route), messages) in batches {
            self.deliver(&topic, &route, messages).await;
        }
    }

    /// Deliver one batch, emitting exactly one outcome per message.
    async fn deliver(&self, topic: &str, route: &Route, messages: Vec<ProducerMessage>) {
        let mut attempt = 0u32;

        loop {
            match self.attempt(topic, route, &messages).await {
                Ok(()) => {
                    trace!(topic, count = messages.len(), "Batch delivered");
                    for message in messages {
                        // Receiver gone means nobody is counting any more
                        let _ = self.successes.send(DeliverySuccess { message });
                    }
                    return;
                }
                Err(e) if e.is_retriable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(
                        topic,
                        attempt,
                        max_retries = self.settings.max_retries,
                        error = %e,
                        "Batch delivery failed, retrying"
                    );
                    sleep(self.settings.retry_backoff).await;
                }
                Err(e) => {
                    let error = e.to_string();
                    warn!(topic, count = messages.len(), error = %error, "Batch delivery failed");
                    for message in messages {
                        let _ = self.failures.send(DeliveryFailure {
                            message,
                            error: error.clone(),
                        });
                    }
                    return;
                }
            }
        }
    }

    async fn attempt(
        &self,
        topic: &str,
        route: &Route,
        messages: &[ProducerMessage],
    ) -> AppResult<()> {
        let limit = self.settings.delivery_timeout;
        timeout(limit, self.transport.deliver(topic, route, messages))
            .await
            .unwrap_or_else(|_| {
                Err(AppError::OperationTimeout(format!(
                    "Delivery to '{topic}' timed out after {limit:?}"
                )))
            })
    }
}
