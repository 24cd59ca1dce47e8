//! Span utilities and extension traits for dispatch tracing.
//!
//! Provides standardized span creation and result recording.

use std::time::Duration;

use tracing::{info_span, Span};

use crate::request::{RequestError, RequestId};
use crate::transport::Method;

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;

    /// Record a delivered request error, including its kind.
    fn record_request_error(&self, error: &RequestError);

    fn record_latency(&self, elapsed: Duration);
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }

    fn record_request_error(&self, error: &RequestError) {
        self.record("status", "error");
        self.record("error.kind", error.kind().as_str());
        self.record("error.message", error.message());
    }

    fn record_latency(&self, elapsed: Duration) {
        self.record("latency_ms", elapsed.as_millis() as u64);
    }
}

/// Factory for the per-cycle dispatch span.
pub struct DispatchSpan;

impl DispatchSpan {
    /// Create a dispatch span with standard fields.
    ///
    /// Fields included:
    /// - `request_id`, `method`, `url`: identify the request
    /// - `worker`: dispatcher index
    /// - `status`, `error.kind`, `error.message`: filled in on outcome
    /// - `http.status`: filled in once the transport answers
    /// - `latency_ms`: filled in after classification
    pub fn new(request_id: RequestId, method: Method, url: &str, worker: usize) -> Span {
        info_span!(
            "dispatch",
            request_id = %request_id,
            method = %method,
            url = %url,
            worker = worker,
            status = tracing::field::Empty,
            error.kind = tracing::field::Empty,
            error.message = tracing::field::Empty,
            http.status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}
