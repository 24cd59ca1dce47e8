//! Dispatch metrics through the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

use crate::request::ErrorKind;

pub const REQUESTS_SUBMITTED: &str = "courier_requests_submitted_total";
pub const REQUESTS_DELIVERED: &str = "courier_requests_delivered_total";
pub const REQUESTS_CANCELED: &str = "courier_requests_canceled_total";
pub const REQUESTS_NOT_MODIFIED: &str = "courier_requests_not_modified_total";
pub const QUEUE_DEPTH: &str = "courier_queue_depth";
pub const DISPATCH_LATENCY: &str = "courier_dispatch_latency_ms";

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() {
    describe_counter!(REQUESTS_SUBMITTED, "Requests accepted by a queue");
    describe_counter!(REQUESTS_DELIVERED, "Requests delivered to a target, by outcome");
    describe_counter!(REQUESTS_CANCELED, "Requests dropped because they were canceled");
    describe_counter!(REQUESTS_NOT_MODIFIED, "Re-deliveries skipped on 304");
    describe_gauge!(QUEUE_DEPTH, "Requests waiting for a dispatcher");
    describe_histogram!(DISPATCH_LATENCY, Unit::Milliseconds, "Transport plus parse time");
}

pub fn record_submitted() {
    counter!(REQUESTS_SUBMITTED).increment(1);
}

pub fn record_delivery_success() {
    counter!(REQUESTS_DELIVERED, "outcome" => "success").increment(1);
}

pub fn record_delivery_failure(kind: ErrorKind) {
    counter!(REQUESTS_DELIVERED, "outcome" => "error", "kind" => kind.as_str()).increment(1);
}

pub fn record_canceled() {
    counter!(REQUESTS_CANCELED).increment(1);
}

pub fn record_not_modified() {
    counter!(REQUESTS_NOT_MODIFIED).increment(1);
}

pub fn record_queue_depth(depth: usize) {
    gauge!(QUEUE_DEPTH).set(depth as f64);
}

pub fn record_dispatch_latency(elapsed: Duration) {
    histogram!(DISPATCH_LATENCY).record(elapsed.as_secs_f64() * 1000.0);
}
