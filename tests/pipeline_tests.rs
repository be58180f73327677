//! Delivery pipeline tests: producer, reconcilers and shutdown draining.
//!
//! Run with: `cargo test --test pipeline_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::task::TaskTracker;

use common::{Failure, MemoryTransport, fast_settings, test_state};
use iggy_rest_proxy::producer::{ProducerSettings, Route};
use iggy_rest_proxy::reconciler;
use iggy_rest_proxy::{AsyncProducer, CounterName, MetricsRegistry, ProducerMessage};

#[tokio::test]
async fn test_three_successes_and_one_failure() {
    let transport = MemoryTransport::new();
    transport.fail_topic("bad", Failure::Permanent);
    let state = test_state(transport.clone());

    for value in ["a", "b", "c"] {
        state
            .producer
            .submit(ProducerMessage::new("orders", value))
            .await
            .unwrap();
    }
    state
        .producer
        .submit(ProducerMessage::new("bad", "d"))
        .await
        .unwrap();

    let counters = state.shutdown().await;

    assert_eq!(counters.success, 3);
    assert_eq!(counters.errors, 1);
    assert_eq!(transport.delivered().len(), 3);
}

#[tokio::test]
async fn test_every_submission_gets_exactly_one_outcome() {
    let transport = MemoryTransport::new();
    transport.fail_topic("audit", Failure::Transient);
    let state = test_state(transport.clone());

    for i in 0..250 {
        let topic = match i % 3 {
            0 => "orders",
            1 => "payments",
            _ => "audit",
        };
        let message =
            ProducerMessage::new(topic, format!("v{i}")).with_key(format!("k{}", i % 7));
        state.producer.submit(message).await.unwrap();
    }

    let counters = state.shutdown().await;

    assert_eq!(counters.total(), state.producer.submitted());
    assert_eq!(counters.success, 167);
    assert_eq!(counters.errors, 83);
}

#[tokio::test]
async fn test_failing_topic_does_not_affect_others() {
    let transport = MemoryTransport::new();
    transport.fail_topic("broken", Failure::Permanent);
    let state = test_state(transport.clone());

    state
        .producer
        .submit(ProducerMessage::new("broken", "x"))
        .await
        .unwrap();
    state
        .producer
        .submit(ProducerMessage::new("orders", "y"))
        .await
        .unwrap();

    let counters = state.shutdown().await;

    assert_eq!(counters.success, 1);
    assert_eq!(counters.errors, 1);
    assert_eq!(transport.delivered(), vec![ProducerMessage::new("orders", "y")]);
}

#[tokio::test]
async fn test_shutdown_drains_buffered_messages() {
    let transport = MemoryTransport::new();
    let settings = ProducerSettings {
        flush_messages: 10_000,
        flush_interval: Duration::from_secs(3600),
        ..fast_settings()
    };
    let tracker = TaskTracker::new();
    let registry = Arc::new(MetricsRegistry::new());
    let (producer, reports) = AsyncProducer::start(transport.clone(), settings, &tracker);
    reconciler::spawn_reconcilers(&tracker, reports, registry.clone());

    for i in 0..10 {
        producer
            .submit(ProducerMessage::new("orders", format!("{i}")))
            .await
            .unwrap();
    }
    // Nothing is due yet
    sleep(Duration::from_millis(50)).await;
    assert!(transport.delivered().is_empty());

    producer.close();
    tracker.close();
    timeout(Duration::from_secs(5), tracker.wait())
        .await
        .expect("pipeline did not drain");

    assert_eq!(transport.delivered().len(), 10);
    assert_eq!(registry.current_value(CounterName::Success), 10);
    assert_eq!(registry.current_value(CounterName::Errors), 0);
}

#[tokio::test]
async fn test_submission_order_is_kept_within_a_route() {
    let transport = MemoryTransport::new();
    let state = test_state(transport.clone());

    for i in 0..20 {
        state
            .producer
            .submit(ProducerMessage::new("orders", format!("{i}")).with_partition(1))
            .await
            .unwrap();
    }
    state.shutdown().await;

    let values: Vec<String> = transport.delivered().into_iter().map(|m| m.value).collect();
    let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    assert_eq!(values, expected);
    assert!(
        transport
            .batches()
            .iter()
            .all(|(topic, route, _)| topic == "orders" && *route == Route::Partition(1))
    );
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let transport = MemoryTransport::new();
    transport.fail_next(2);
    let state = test_state(transport.clone());

    state
        .producer
        .submit(ProducerMessage::new("orders", "a"))
        .await
        .unwrap();
    let counters = state.shutdown().await;

    assert_eq!(counters.success, 1);
    assert_eq!(counters.errors, 0);
    assert_eq!(transport.attempts(), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let transport = MemoryTransport::new();
    transport.fail_topic("orders", Failure::Transient);
    let state = test_state(transport.clone());

    state
        .producer
        .submit(ProducerMessage::new("orders", "a"))
        .await
        .unwrap();
    let counters = state.shutdown().await;

    assert_eq!(counters.errors, 1);
    assert_eq!(counters.success, 0);
    // First attempt plus three retries
    assert_eq!(transport.attempts(), 4);
}

#[tokio::test]
async fn test_unreachable_broker_fails_deliveries_and_shutdown_completes() {
    let transport = MemoryTransport::new();
    transport.fail_topic("orders", Failure::Unreachable);
    let state = test_state(transport.clone());

    for value in ["a", "b", "c"] {
        state
            .producer
            .submit(ProducerMessage::new("orders", value))
            .await
            .unwrap();
    }
    state
        .producer
        .submit(ProducerMessage::new("payments", "d"))
        .await
        .unwrap();

    let counters = timeout(Duration::from_secs(5), state.shutdown())
        .await
        .expect("shutdown hung on an unreachable broker");

    assert_eq!(counters.errors, 3);
    assert_eq!(counters.success, 1);
    assert_eq!(counters.total(), state.producer.submitted());
    // Each stuck batch gets a first attempt plus three retries, each timed out
    assert!(transport.attempts() >= 5);
}

#[tokio::test]
async fn test_permanent_failures_are_not_retried() {
    let transport = MemoryTransport::new();
    transport.fail_topic("orders", Failure::Permanent);
    let state = test_state(transport.clone());

    state
        .producer
        .submit(ProducerMessage::new("orders", "a"))
        .await
        .unwrap();
    state.shutdown().await;

    assert_eq!(transport.attempts(), 1);
}

#[tokio::test]
async fn test_full_queue_applies_backpressure() {
    let transport = MemoryTransport::new();
    let settings = ProducerSettings {
        flush_messages: 1,
        channel_capacity: 1,
        ..fast_settings()
    };
    let tracker = TaskTracker::new();
    let (producer, mut reports) = AsyncProducer::start(transport.clone(), settings, &tracker);

    let gate = transport.pause().await;
    let submitter = {
        let producer = producer.clone();
        tokio::spawn(async move {
            for i in 0..5 {
                producer
                    .submit(ProducerMessage::new("orders", format!("{i}")))
                    .await
                    .unwrap();
            }
        })
    };

    sleep(Duration::from_millis(100)).await;
    assert!(!submitter.is_finished());
    assert!(producer.submitted() < 5);

    drop(gate);
    timeout(Duration::from_secs(5), submitter)
        .await
        .expect("submitter stayed blocked")
        .unwrap();
    producer.close();
    tracker.close();
    tracker.wait().await;

    let mut acknowledged = 0;
    while reports.successes.next().await.is_some() {
        acknowledged += 1;
    }
    assert_eq!(acknowledged, 5);
}

#[tokio::test]
async fn test_submit_after_shutdown_is_rejected() {
    let state = test_state(MemoryTransport::new());
    state.shutdown().await;

    let result = state
        .producer
        .submit(ProducerMessage::new("orders", "late"))
        .await;

    assert!(result.is_err());
    assert_eq!(state.producer.submitted(), 0);
}
