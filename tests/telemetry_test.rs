//! Telemetry module tests for the courier queue.

use std::path::PathBuf;
use std::time::Duration;

use courier_core::request::{ErrorKind, RequestError, RequestId};
use courier_core::telemetry::{
    init_logging, init_metrics, record_canceled, record_delivery_failure, record_delivery_success,
    record_dispatch_latency, record_not_modified, record_queue_depth, record_submitted,
    DispatchSpan, LogConfig, LogError, LogFormat, SpanExt,
};
use courier_core::transport::Method;
use courier_core::Request;
use tracing::Span;

fn some_request_id() -> RequestId {
    Request::text(Method::Get, "http://localhost/").id()
}

// =============================================================================
// LogConfig Tests
// =============================================================================

#[test]
fn log_config_default_is_json() {
    let config = LogConfig::default();
    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, "info");
    assert!(config.output_path.is_none());
}

#[test]
fn log_config_with_output_path() {
    let config = LogConfig {
        format: LogFormat::Json,
        level: "courier_core::scheduler=trace".to_string(),
        output_path: Some(PathBuf::from("/tmp/courier.log")),
    };
    assert_eq!(config.output_path, Some(PathBuf::from("/tmp/courier.log")));
}

#[test]
fn log_format_parses_case_insensitively() {
    assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    assert!("xml".parse::<LogFormat>().is_err());
    assert_eq!(LogFormat::Pretty.as_str(), "pretty");
}

#[test]
fn init_logging_rejects_bad_filter() {
    let config = LogConfig {
        level: "courier_core=notalevel".to_string(),
        ..LogConfig::default()
    };
    assert!(matches!(init_logging(&config), Err(LogError::InvalidFilter(_))));
}

#[test]
fn init_logging_reports_unopenable_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = LogConfig {
        output_path: Some(dir.path().join("missing").join("courier.log")),
        ..LogConfig::default()
    };
    assert!(matches!(init_logging(&config), Err(LogError::FileOpen(_))));
}

// =============================================================================
// LogError Tests
// =============================================================================

#[test]
fn log_error_invalid_filter_display() {
    let error = LogError::InvalidFilter("bad filter".to_string());
    assert!(error.to_string().contains("Invalid log filter"));
    assert!(error.to_string().contains("bad filter"));
}

#[test]
fn log_error_file_open_display() {
    let error = LogError::FileOpen("permission denied".to_string());
    assert!(error.to_string().contains("Failed to open log file"));
}

#[test]
fn log_error_already_initialized_display() {
    let error = LogError::AlreadyInitialized;
    assert!(error.to_string().contains("already initialized"));
}

// =============================================================================
// Span Tests
// =============================================================================

#[test]
fn span_ext_record_result_ok_and_err() {
    let span = Span::none();
    span.record_result(&Ok::<i32, &str>(42));
    span.record_result(&Err::<i32, &str>("test error"));
}

#[test]
fn span_ext_record_request_error() {
    let span = DispatchSpan::new(some_request_id(), Method::Get, "http://localhost/", 0);
    span.record_request_error(&RequestError::parse("bad json"));
    span.record_latency(Duration::from_millis(12));
}

#[test]
fn dispatch_spans_nest_without_panic() {
    let outer = DispatchSpan::new(some_request_id(), Method::Post, "http://localhost/a", 1);
    let inner = DispatchSpan::new(some_request_id(), Method::Delete, "http://localhost/b", 2);
    let _outer = outer.enter();
    let _inner = inner.enter();
}

// =============================================================================
// Metrics Tests
// =============================================================================

#[test]
fn metrics_init_no_panic() {
    // Multiple calls should not panic
    init_metrics();
    init_metrics();
}

#[test]
fn record_outcomes_no_panic() {
    record_submitted();
    record_delivery_success();
    for kind in [
        ErrorKind::Transport,
        ErrorKind::Timeout,
        ErrorKind::Status,
        ErrorKind::Parse,
        ErrorKind::Internal,
    ] {
        record_delivery_failure(kind);
    }
    record_canceled();
    record_not_modified();
}

#[test]
fn metrics_record_extreme_values() {
    record_queue_depth(0);
    record_queue_depth(usize::MAX / 2);
    record_dispatch_latency(Duration::ZERO);
    record_dispatch_latency(Duration::from_secs(3600));
}
