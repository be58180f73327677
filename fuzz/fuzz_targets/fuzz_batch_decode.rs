//! Fuzz the record batch decoder with arbitrary request bodies.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_batch_decode -- -max_total_time=60
//! ```
//!
//! Decoding must never panic, and a decoded batch must turn into producer
//! messages without losing records.

#![no_main]

use iggy_rest_proxy::ProducerMessage;
use iggy_rest_proxy::models::BatchRequest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(batch) = BatchRequest::from_slice(data) else {
        return;
    };

    let count = batch.len();
    let messages: Vec<_> = batch
        .records
        .into_iter()
        .map(|record| ProducerMessage::from_record("fuzz", record))
        .collect();
    assert_eq!(messages.len(), count);

    for message in &messages {
        // Route selection is total over every decoded record
        let _ = message.route();
    }
});
