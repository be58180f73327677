//! Delivery counters and Prometheus export.
//!
//! The authoritative delivery counters live in [`MetricsRegistry`], an
//! injected pair of atomics incremented by the reconciler tasks. A mirror
//! task periodically copies them into the `metrics` facade, where the
//! Prometheus exporter serves them (default: `0.0.0.0:9090/metrics`).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `iggy_rest_delivery_success_total` - Messages acknowledged by the broker
//! - `iggy_rest_delivery_errors_total` - Messages that could not be delivered
//! - `iggy_rest_records_accepted_total` - Records queued for delivery
//! - `iggy_rest_batches_rejected_total` - Request bodies that failed to decode
//! - `iggy_rest_reconnects_total` - Reconnection attempts to the broker
//! - `iggy_rest_circuit_breaker_opened_total` - Times the broker circuit opened
//! - `iggy_rest_circuit_breaker_rejected_total` - Operations refused while open
//!
//! Topic names come straight from request paths, so no metric is labelled
//! with them; per-topic series would grow with every path a caller invents.
//!
//! ## Gauges
//! - `iggy_rest_broker_connection_status` - 1 = connected, 0 = disconnected

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace};

/// Metric names as constants for consistency.
pub mod names {
    pub const DELIVERY_SUCCESS_TOTAL: &str = "iggy_rest_delivery_success_total";
    pub const DELIVERY_ERRORS_TOTAL: &str = "iggy_rest_delivery_errors_total";
    pub const RECORDS_ACCEPTED_TOTAL: &str = "iggy_rest_records_accepted_total";
    pub const BATCHES_REJECTED_TOTAL: &str = "iggy_rest_batches_rejected_total";
    pub const RECONNECTS_TOTAL: &str = "iggy_rest_reconnects_total";
    pub const CIRCUIT_BREAKER_OPENED_TOTAL: &str = "iggy_rest_circuit_breaker_opened_total";
    pub const CIRCUIT_BREAKER_REJECTED_TOTAL: &str = "iggy_rest_circuit_breaker_rejected_total";
    pub const BROKER_CONNECTION_STATUS: &str = "iggy_rest_broker_connection_status";
}

/// The two delivery counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterName {
    Success,
    Errors,
}

impl CounterName {
    pub fn as_str(self) -> &'static str {
        match self {
            CounterName::Success => "success",
            CounterName::Errors => "errors",
        }
    }

    /// Name of the exported Prometheus counter.
    pub fn metric_name(self) -> &'static str {
        match self {
            CounterName::Success => names::DELIVERY_SUCCESS_TOTAL,
            CounterName::Errors => names::DELIVERY_ERRORS_TOTAL,
        }
    }
}

impl std::fmt::Display for CounterName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of both counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub success: u64,
    pub errors: u64,
}

impl CounterSnapshot {
    pub fn total(&self) -> u64 {
        self.success + self.errors
    }
}

/// Process-lifetime delivery counters.
///
/// Each counter has a single writer (its reconciler task), so plain atomic
/// adds are enough. `Relaxed` ordering: readers only need an eventually
/// consistent value.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    success: AtomicU64,
    errors: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, name: CounterName) {
        self.counter(name).fetch_add(1, Ordering::Relaxed);
    }

    pub fn current_value(&self, name: CounterName) -> u64 {
        self.counter(name).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            success: self.current_value(CounterName::Success),
            errors: self.current_value(CounterName::Errors),
        }
    }

    fn counter(&self, name: CounterName) -> &AtomicU64 {
        match name {
            CounterName::Success => &self.success,
            CounterName::Errors => &self.errors,
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// # Arguments
///
/// * `metrics_addr` - Address for the Prometheus metrics endpoint
/// * `source` - Optional value of a `source` label added to every metric
pub fn init_metrics(metrics_addr: SocketAddr, source: Option<&str>) -> Result<(), String> {
    let mut builder = PrometheusBuilder::new().with_http_listener(metrics_addr);
    if let Some(source) = source {
        builder = builder.add_global_label("source", source);
    }
    builder
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::DELIVERY_SUCCESS_TOTAL,
        "Total number of messages acknowledged by Iggy"
    );
    describe_counter!(
        names::DELIVERY_ERRORS_TOTAL,
        "Total number of messages Iggy could not accept after retries"
    );
    describe_counter!(
        names::RECORDS_ACCEPTED_TOTAL,
        "Total number of records queued for asynchronous delivery"
    );
    describe_counter!(
        names::BATCHES_REJECTED_TOTAL,
        "Total number of request bodies rejected as malformed"
    );
    describe_counter!(
        names::RECONNECTS_TOTAL,
        "Total number of connection reconnection attempts"
    );
    describe_counter!(
        names::CIRCUIT_BREAKER_OPENED_TOTAL,
        "Total number of times the broker circuit breaker opened"
    );
    describe_counter!(
        names::CIRCUIT_BREAKER_REJECTED_TOTAL,
        "Total number of broker operations refused by an open circuit"
    );
    describe_gauge!(
        names::BROKER_CONNECTION_STATUS,
        "Iggy connection status (1 = connected, 0 = disconnected)"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr, source: Option<&str>) {
    if let Err(e) = init_metrics(metrics_addr, source) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Copy the registry into the exported counters.
pub fn mirror_counters(registry: &MetricsRegistry) {
    let snapshot = registry.snapshot();
    counter!(CounterName::Success.metric_name()).absolute(snapshot.success);
    counter!(CounterName::Errors.metric_name()).absolute(snapshot.errors);
    trace!(
        success = snapshot.success,
        errors = snapshot.errors,
        "Delivery counters mirrored"
    );
}

/// Spawn the periodic mirror of `registry` into the exporter.
pub fn spawn_telemetry_mirror(
    tracker: &TaskTracker,
    cancel: CancellationToken,
    registry: Arc<MetricsRegistry>,
    every: Duration,
) {
    tracker.spawn(async move {
        let mut ticker = interval(every);
        ticker.tick().await; // Skip the first immediate tick

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Telemetry mirror received cancellation signal");
                    break;
                }
                _ = ticker.tick() => mirror_counters(&registry),
            }
        }
    });
}

/// Record records accepted for delivery. Empty batches leave no trace.
pub fn record_records_accepted(count: u64) {
    if count > 0 {
        counter!(names::RECORDS_ACCEPTED_TOTAL).increment(count);
    }
}

/// Record a rejected request body.
pub fn record_batch_rejected() {
    counter!(names::BATCHES_REJECTED_TOTAL).increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect_attempt() {
    counter!(names::RECONNECTS_TOTAL).increment(1);
}

/// Record the circuit breaker opening.
pub fn record_circuit_opened() {
    counter!(names::CIRCUIT_BREAKER_OPENED_TOTAL).increment(1);
}

/// Record an operation refused by the open circuit.
pub fn record_circuit_rejection() {
    counter!(names::CIRCUIT_BREAKER_REJECTED_TOTAL).increment(1);
}

/// Update connection status gauge.
pub fn set_connection_status(connected: bool) {
    gauge!(names::BROKER_CONNECTION_STATUS).set(if connected { 1.0 } else { 0.0 });
}
