use std::future::Future;

use super::message::{ProducerMessage, Route};
use crate::error::AppResult;

/// Broker connection used by the dispatcher to deliver flushed batches.
///
/// Every message in `messages` targets `topic` and shares `route`. The call
/// either delivers the whole batch or fails it as a unit; retrying is the
/// dispatcher's job.
pub trait DeliveryTransport: Send + Sync + 'static {
    fn deliver(
        &self,
        topic: &str,
        route: &Route,
        messages: &[ProducerMessage],
    ) -> impl Future<Output = AppResult<()>> + Send;
}
