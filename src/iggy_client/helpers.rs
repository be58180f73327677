//! Helper functions for the Iggy client.

use std::time::Duration;

use iggy::prelude::Identifier;

use crate::error::AppError;

/// Jitter applied to reconnect delays (±20%).
const BACKOFF_JITTER_PERCENT: f64 = 0.2;

/// Floor for any reconnect delay, jitter included.
const MIN_RECONNECT_DELAY_MS: u64 = 100;

/// Convert a stream or topic name into an Iggy identifier.
///
/// Iggy names must be 1-255 characters, alphanumeric with dots, underscores
/// or hyphens. The SDK error is logged and replaced with a readable message.
pub fn to_identifier(name: &str, resource_type: &str) -> Result<Identifier, AppError> {
    name.try_into().map_err(|e: iggy::prelude::IggyError| {
        tracing::debug!(
            resource_type,
            name,
            original_error = %e,
            "Identifier conversion failed"
        );
        AppError::BadRequest(format!("Invalid {resource_type} name '{name}'"))
    })
}

/// Generate a random jitter value between 0.0 and 1.0.
pub fn rand_jitter() -> f64 {
    use rand::Rng;
    rand::rng().random::<f64>()
}

/// Delay before reconnect attempt number `attempt` (1-based).
///
/// Doubles from `base` per attempt, capped at `max`, then shifted by up to
/// ±20% using `jitter` in `[0, 1)`. Never below 100ms.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration, jitter: f64) -> Duration {
    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let delay_ms = base_ms
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(max_ms);

    let offset = (delay_ms as f64 * BACKOFF_JITTER_PERCENT * (jitter * 2.0 - 1.0)) as i64;
    let final_ms = (delay_ms as i64)
        .saturating_add(offset)
        .max(MIN_RECONNECT_DELAY_MS as i64) as u64;

    Duration::from_millis(final_ms)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_identifier_valid_names() {
        assert!(to_identifier("orders", "topic").is_ok());
        assert!(to_identifier("my-stream", "stream").is_ok());
        assert!(to_identifier("events.v2", "topic").is_ok());
    }

    #[test]
    fn test_to_identifier_rejects_empty_and_long_names() {
        let err = to_identifier("", "topic").unwrap_err();
        assert!(err.to_string().contains("Invalid topic name"));

        assert!(to_identifier(&"a".repeat(300), "topic").is_err());
    }

    #[test]
    fn test_rand_jitter_in_range() {
        for _ in 0..100 {
            let jitter = rand_jitter();
            assert!((0.0..1.0).contains(&jitter));
        }
    }

    #[test]
    fn test_backoff_doubles_without_jitter() {
        let base = Duration::from_millis(1000);
        let max = Duration::from_secs(30);

        // jitter 0.5 maps to a zero offset
        assert_eq!(backoff_delay(1, base, max, 0.5), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2, base, max, 0.5), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3, base, max, 0.5), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_is_capped() {
        let delay = backoff_delay(
            40,
            Duration::from_millis(1000),
            Duration::from_secs(30),
            0.5,
        );
        assert_eq!(delay, Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_jitter_bounds_and_floor() {
        let base = Duration::from_millis(1000);
        let max = Duration::from_secs(30);

        assert_eq!(backoff_delay(1, base, max, 0.0), Duration::from_millis(800));
        assert!(backoff_delay(1, base, max, 0.999) <= Duration::from_millis(1200));
        assert_eq!(
            backoff_delay(1, Duration::from_millis(10), max, 0.0),
            Duration::from_millis(100)
        );
    }
}
