//! HTTP middleware.
//!
//! - **Request ID**: generation and propagation of `X-Request-Id` so a
//!   caller's batch can be matched with the proxy's log lines

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, RequestIdExt, RequestIdLayer};
