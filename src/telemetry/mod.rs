//! Telemetry for the dispatch queue.
//!
//! Provides structured logging, per-request tracing spans, and metrics.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    init_metrics, record_canceled, record_delivery_failure, record_delivery_success,
    record_dispatch_latency, record_not_modified, record_queue_depth, record_submitted,
    DISPATCH_LATENCY, QUEUE_DEPTH, REQUESTS_CANCELED, REQUESTS_DELIVERED, REQUESTS_NOT_MODIFIED,
    REQUESTS_SUBMITTED,
};
pub use spans::{DispatchSpan, SpanExt};
