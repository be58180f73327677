//! Shared fixtures: an in-memory delivery transport and an app builder.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use iggy_rest_proxy::iggy_client::ConnectionState;
use iggy_rest_proxy::producer::{ProducerSettings, Route};
use iggy_rest_proxy::{AppError, AppResult, AppState, Config, DeliveryTransport, ProducerMessage};

/// How deliveries to a topic fail.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// Every attempt fails with a non-retriable error
    Permanent,
    /// Every attempt fails with a retriable error
    Transient,
    /// Every attempt hangs, like a broker that never comes back
    Unreachable,
}

#[derive(Default)]
struct Inner {
    delivered: Mutex<Vec<ProducerMessage>>,
    batches: Mutex<Vec<(String, Route, usize)>>,
    failing: Mutex<HashMap<String, Failure>>,
    flaky_remaining: AtomicU32,
    attempts: AtomicU32,
    gate: Arc<RwLock<()>>,
}

/// Transport that records every delivered message.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to `topic` fail.
    pub fn fail_topic(&self, topic: &str, failure: Failure) {
        self.inner
            .failing
            .lock()
            .unwrap()
            .insert(topic.to_string(), failure);
    }

    /// Fail the next `count` attempts with a retriable error, whatever the topic.
    pub fn fail_next(&self, count: u32) {
        self.inner.flaky_remaining.store(count, Ordering::SeqCst);
    }

    /// Block every delivery until the returned guard is dropped.
    pub async fn pause(&self) -> OwnedRwLockWriteGuard<()> {
        self.inner.gate.clone().write_owned().await
    }

    pub fn delivered(&self) -> Vec<ProducerMessage> {
        self.inner.delivered.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<(String, Route, usize)> {
        self.inner.batches.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

impl DeliveryTransport for MemoryTransport {
    async fn deliver(
        &self,
        topic: &str,
        route: &Route,
        messages: &[ProducerMessage],
    ) -> AppResult<()> {
        let _open = self.inner.gate.read().await;
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        let flaky = self
            .inner
            .flaky_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if flaky {
            return Err(AppError::SendError("broker busy".to_string()));
        }

        let failure = self.inner.failing.lock().unwrap().get(topic).copied();
        match failure {
            Some(Failure::Permanent) => {
                return Err(AppError::BadRequest(format!("Invalid topic name '{topic}'")));
            }
            Some(Failure::Transient) => {
                return Err(AppError::Disconnected("connection dropped".to_string()));
            }
            Some(Failure::Unreachable) => std::future::pending::<()>().await,
            None => {}
        }

        self.inner
            .batches
            .lock()
            .unwrap()
            .push((topic.to_string(), route.clone(), messages.len()));
        self.inner
            .delivered
            .lock()
            .unwrap()
            .extend_from_slice(messages);
        Ok(())
    }
}

/// Producer settings that keep tests fast.
pub fn fast_settings() -> ProducerSettings {
    ProducerSettings {
        flush_messages: 100,
        flush_interval: Duration::from_millis(20),
        channel_capacity: 16,
        max_retries: 3,
        retry_backoff: Duration::from_millis(1),
        delivery_timeout: Duration::from_millis(50),
    }
}

/// Config for an in-process app without a metrics exporter.
pub fn test_config() -> Config {
    let settings = fast_settings();
    Config {
        producer_flush_messages: settings.flush_messages,
        producer_flush_interval: settings.flush_interval,
        producer_channel_capacity: settings.channel_capacity,
        producer_max_retries: settings.max_retries,
        producer_retry_backoff: settings.retry_backoff,
        producer_delivery_timeout: settings.delivery_timeout,
        metrics_port: 0,
        telemetry_interval: Duration::from_millis(50),
        ..Config::default()
    }
}

/// App state backed by a [`MemoryTransport`] with a live connection.
pub fn test_state(transport: MemoryTransport) -> AppState {
    let connection = Arc::new(ConnectionState::new());
    connection.set_connected(true);
    AppState::new(transport, connection, test_config())
}
