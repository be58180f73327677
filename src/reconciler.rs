//! Turns delivery outcomes into counter updates.
//!
//! Two tasks run for the lifetime of the producer: one drains the success
//! stream into [`CounterName::Success`], the other drains the failure stream
//! into [`CounterName::Errors`]. Each task exits only when its stream ends,
//! i.e. after the producer is closed and every accepted message has an
//! outcome. Both run on the caller's `TaskTracker`, so waiting on the tracker
//! waits until every outcome has been counted.

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

use crate::metrics::{CounterName, MetricsRegistry};
use crate::producer::{DeliveryReports, Failures, Successes};

/// Spawn both reconciler loops on `tracker`.
pub fn spawn_reconcilers(
    tracker: &TaskTracker,
    reports: DeliveryReports,
    registry: Arc<MetricsRegistry>,
) {
    let DeliveryReports {
        successes,
        failures,
    } = reports;

    tracker.spawn(count_successes(successes, registry.clone()));
    tracker.spawn(count_failures(failures, registry));
}

/// Count every acknowledgment until the stream ends.
pub async fn count_successes(mut successes: Successes, registry: Arc<MetricsRegistry>) {
    while let Some(success) = successes.next().await {
        registry.increment(CounterName::Success);
        trace!(topic = %success.message.topic, "Delivery acknowledged");
    }

    debug!(
        total = registry.current_value(CounterName::Success),
        "Success stream closed"
    );
}

/// Count every failed delivery until the stream ends.
pub async fn count_failures(mut failures: Failures, registry: Arc<MetricsRegistry>) {
    while let Some(failure) = failures.next().await {
        registry.increment(CounterName::Errors);
        warn!(
            topic = %failure.message.topic,
            partition = ?failure.message.partition,
            error = %failure.error,
            "Delivery failed"
        );
    }

    debug!(
        total = registry.current_value(CounterName::Errors),
        "Failure stream closed"
    );
}
