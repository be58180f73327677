//! Shared application state for Axum handlers.
//!
//! `AppState` wires the delivery pipeline together and owns its lifecycle:
//!
//! - **Producer**: submission handle shared by every request
//! - **Registry**: delivery counters fed by the reconciler tasks
//! - **Connection**: broker connection status for health endpoints
//!
//! # Structured Concurrency
//!
//! The producer dispatcher, both reconcilers, the telemetry mirror and the
//! health check all run on one `tokio_util::task::TaskTracker`. `shutdown()`
//! closes the producer and waits on the tracker, so it returns only after
//! every accepted message has been delivered or failed and counted.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::iggy_client::ConnectionState;
use crate::metrics::{self, CounterSnapshot, MetricsRegistry};
use crate::producer::{AsyncProducer, DeliveryTransport, ProducerHandle, ProducerSettings};
use crate::reconciler;

/// Shared application state for Axum handlers.
///
/// Cloned for each request; every field is a handle to shared data.
///
/// # Lifecycle
///
/// ```rust,ignore
/// let state = AppState::new(transport, connection, config);
/// // ... serve requests ...
/// state.shutdown().await;  // Drain deliveries and stop background tasks
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Submission side of the async producer
    pub producer: ProducerHandle,
    /// Delivery counters
    pub registry: Arc<MetricsRegistry>,
    /// Broker connection status
    pub connection: Arc<ConnectionState>,
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Application configuration
    pub config: Arc<Config>,
    /// Tracks every background task for graceful shutdown
    task_tracker: TaskTracker,
    /// Stops the periodic tasks (mirror, health check)
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Start the delivery pipeline on `transport` and build the state.
    ///
    /// # Background Tasks
    ///
    /// Spawns the producer dispatcher, the success and failure reconcilers,
    /// the telemetry mirror and the connection health check.
    pub fn new<T: DeliveryTransport>(
        transport: T,
        connection: Arc<ConnectionState>,
        config: Config,
    ) -> Self {
        let task_tracker = TaskTracker::new();
        let cancellation_token = CancellationToken::new();
        let registry = Arc::new(MetricsRegistry::new());

        let (producer, reports) = AsyncProducer::start(
            transport,
            ProducerSettings::from_config(&config),
            &task_tracker,
        );
        reconciler::spawn_reconcilers(&task_tracker, reports, registry.clone());
        metrics::spawn_telemetry_mirror(
            &task_tracker,
            cancellation_token.clone(),
            registry.clone(),
            config.telemetry_interval,
        );

        let state = Self {
            producer,
            registry,
            connection,
            started_at: Instant::now(),
            config: Arc::new(config),
            task_tracker,
            cancellation_token,
        };

        state.spawn_health_check_task();

        state
    }

    /// Periodically log when the broker connection is down.
    fn spawn_health_check_task(&self) {
        let connection = self.connection.clone();
        let interval_duration = self.config.health_check_interval;
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(interval_duration);
            ticker.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!("Health check task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if connection.is_connected() {
                            trace!("Health check: Iggy connection OK");
                        } else {
                            warn!("Health check: Iggy connection is down");
                        }
                    }
                }
            }
        });
    }

    /// Drain the pipeline and stop all background tasks.
    ///
    /// 1. Closes the producer; queued messages are still delivered
    /// 2. Cancels the periodic tasks
    /// 3. Waits until the dispatcher and both reconcilers have exited
    /// 4. Mirrors the final counters one last time
    pub async fn shutdown(&self) -> CounterSnapshot {
        info!("Initiating graceful shutdown of the delivery pipeline");

        self.producer.close();
        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        metrics::mirror_counters(&self.registry);
        let snapshot = self.registry.snapshot();
        info!(
            submitted = self.producer.submitted(),
            success = snapshot.success,
            errors = snapshot.errors,
            "All deliveries drained"
        );

        snapshot
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
