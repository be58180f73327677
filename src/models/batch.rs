//! Wire format of `POST /topics/{topic}` request bodies.

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// A batch of records published to one topic.
///
/// ```json
/// {
///   "records": [
///     { "value": "a" },
///     { "key": "k1", "value": "b", "partition": 2 }
///   ]
/// }
/// ```
///
/// A body without `records` decodes to an empty batch. Unknown fields are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub records: Vec<Record>,
}

impl BatchRequest {
    /// Decode a raw request body.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MalformedBatch` when the body is not JSON or does not
    /// match the batch shape (for example a record without `value`).
    pub fn from_slice(body: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(body).map_err(|e| AppError::MalformedBatch(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One record of a batch. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    /// Routing key; records sharing a key land on the same partition
    #[serde(default)]
    pub key: Option<String>,
    /// Message payload
    pub value: String,
    /// Explicit target partition, overriding key-based routing
    #[serde(default)]
    pub partition: Option<u32>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_batch() {
        let body = br#"{"records":[{"value":"a"},{"key":"k1","value":"b","partition":2}]}"#;
        let batch = BatchRequest::from_slice(body).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.records[0],
            Record {
                key: None,
                value: "a".to_string(),
                partition: None,
            }
        );
        assert_eq!(batch.records[1].key.as_deref(), Some("k1"));
        assert_eq!(batch.records[1].partition, Some(2));
    }

    #[test]
    fn test_missing_records_is_empty_batch() {
        let batch = BatchRequest::from_slice(b"{}").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let body = br#"{"records":[{"value":"a","headers":{}}],"extra":1}"#;
        assert_eq!(BatchRequest::from_slice(body).unwrap().len(), 1);
    }

    #[test]
    fn test_null_key_and_partition_accepted() {
        let body = br#"{"records":[{"key":null,"value":"a","partition":null}]}"#;
        let batch = BatchRequest::from_slice(body).unwrap();

        assert_eq!(batch.records[0].key, None);
        assert_eq!(batch.records[0].partition, None);
    }

    #[test]
    fn test_explicit_partition_zero_is_kept() {
        let body = br#"{"records":[{"value":"a","partition":0}]}"#;
        let batch = BatchRequest::from_slice(body).unwrap();

        assert_eq!(batch.records[0].partition, Some(0));
    }

    #[test]
    fn test_malformed_bodies_rejected() {
        let cases: [&[u8]; 7] = [
            b"not json",
            b"",
            br#"{"records":[{"key":"k"}]}"#,
            br#"{"records":[{"value":1}]}"#,
            br#"{"records":[{"value":"a","partition":-1}]}"#,
            br#"{"records":{"value":"a"}}"#,
            br#"[{"value":"a"}]"#,
        ];

        for body in cases {
            let result = BatchRequest::from_slice(body);
            assert!(
                matches!(result, Err(AppError::MalformedBatch(_))),
                "body {:?} should be rejected",
                String::from_utf8_lossy(body)
            );
        }
    }
}
