//! Request ID middleware.
//!
//! Every request gets an `X-Request-Id`: the caller's own value when it sent
//! a non-empty one, otherwise a fresh UUIDv4. The id is written back into the
//! request (for handlers and logs) and echoed on the response.
//!
//! ```bash
//! curl -H "X-Request-Id: batch-42" -d '{"records":[{"value":"a"}]}' \
//!      http://localhost:3000/topics/orders
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tower layer that attaches request ids.
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// Service produced by [`RequestIdLayer`].
#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let request_id = request_id_for(&req);
        debug!(request_id = ?request_id, path = %req.uri().path(), "Processing request");
        req.headers_mut()
            .insert(REQUEST_ID_HEADER, request_id.clone());

        // Take the instance that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            response
                .headers_mut()
                .insert(REQUEST_ID_HEADER, request_id);
            Ok(response)
        })
    }
}

/// The caller's request id if usable, otherwise a new UUIDv4.
fn request_id_for<B>(req: &Request<B>) -> HeaderValue {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .filter(|value| !value.is_empty() && value.to_str().is_ok())
        .cloned()
        .unwrap_or_else(generate_request_id)
}

fn generate_request_id() -> HeaderValue {
    // A hyphenated UUID is always a valid header value
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

/// Extension trait to read the request id inside handlers.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_caller_request_id() {
        let req = Request::builder()
            .header(REQUEST_ID_HEADER, "batch-42")
            .body(Body::empty())
            .unwrap();

        assert_eq!(request_id_for(&req), "batch-42");
    }

    #[test]
    fn test_generates_uuid_when_missing_or_empty() {
        let missing = Request::builder().body(Body::empty()).unwrap();
        let empty = Request::builder()
            .header(REQUEST_ID_HEADER, "")
            .body(Body::empty())
            .unwrap();

        for req in [missing, empty] {
            let id = request_id_for(&req);
            assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
        }
    }

    #[test]
    fn test_request_id_ext_trait() {
        let req = Request::builder()
            .header(REQUEST_ID_HEADER, "test-id")
            .body(Body::empty())
            .unwrap();
        assert_eq!(req.request_id(), Some("test-id"));

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(req.request_id(), None);
    }
}
