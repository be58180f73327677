//! Broker-facing message and delivery outcome types.

use crate::models::Record;

/// One record bound to a topic, ready for delivery.
///
/// Ownership moves into the producer on submission. No identifier links a
/// message back to the request that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerMessage {
    pub topic: String,
    /// Routing key, empty when the record had none
    pub key: String,
    pub value: String,
    /// Explicit partition, `None` leaves the choice to the broker
    pub partition: Option<u32>,
}

impl ProducerMessage {
    pub fn new(topic: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: String::new(),
            value: value.into(),
            partition: None,
        }
    }

    /// Build the message for `record` published to `topic`.
    pub fn from_record(topic: &str, record: Record) -> Self {
        Self {
            topic: topic.to_string(),
            key: record.key.unwrap_or_default(),
            value: record.value,
            partition: record.partition,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Partitioning decision for this message.
    ///
    /// An explicit partition wins over the key; without either the broker
    /// balances messages across partitions.
    pub fn route(&self) -> Route {
        match (self.partition, self.key.is_empty()) {
            (Some(partition), _) => Route::Partition(partition),
            (None, false) => Route::Key(self.key.clone()),
            (None, true) => Route::Balanced,
        }
    }
}

/// How a batch of messages is spread over a topic's partitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Balanced,
    Partition(u32),
    Key(String),
}

/// The broker acknowledged a message.
#[derive(Debug, Clone)]
pub struct DeliverySuccess {
    pub message: ProducerMessage,
}

/// A message could not be delivered once retries were exhausted.
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub message: ProducerMessage,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_record_defaults() {
        let record = Record {
            key: None,
            value: "a".to_string(),
            partition: None,
        };

        let message = ProducerMessage::from_record("orders", record);

        assert_eq!(message, ProducerMessage::new("orders", "a"));
        assert_eq!(message.key, "");
        assert_eq!(message.route(), Route::Balanced);
    }

    #[test]
    fn test_route_prefers_partition_over_key() {
        let message = ProducerMessage::new("orders", "b")
            .with_key("k1")
            .with_partition(2);

        assert_eq!(message.route(), Route::Partition(2));
    }

    #[test]
    fn test_route_by_key() {
        let message = ProducerMessage::new("orders", "b").with_key("k1");
        assert_eq!(message.route(), Route::Key("k1".to_string()));
    }

    #[test]
    fn test_partition_zero_is_explicit() {
        let message = ProducerMessage::new("orders", "b").with_partition(0);
        assert_eq!(message.route(), Route::Partition(0));
    }
}
