//! Dispatcher threads: take a request, run the exchange, post the outcome.
//!
//! Each cycle walks wait-for-item, check-canceled, execute-transport,
//! classify-outcome, deliver and cleanup. A failure inside one cycle is
//! converted into an error delivery; it never ends the loop.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, warn, Span};

use super::ordered::OrderedQueue;
use crate::delivery::{DeliveryTarget, ImmediateTarget, Job};
use crate::request::{Dispatchable, QueueError, RequestError};
use crate::telemetry::{self, DispatchSpan, SpanExt};
use crate::transport::{OutboundRequest, Transport};

pub(crate) type SharedQueue = Arc<OrderedQueue<Arc<dyn Dispatchable>>>;

/// One worker thread bound to the shared queue.
pub(crate) struct Dispatcher {
    id: usize,
    quit: Arc<AtomicBool>,
    queue: SharedQueue,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub(crate) fn spawn(
        id: usize,
        queue: SharedQueue,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, QueueError> {
        let quit = Arc::new(AtomicBool::new(false));
        let worker_quit = quit.clone();
        let worker_queue = queue.clone();

        let handle = thread::Builder::new()
            .name(format!("courier-dispatcher-{}", id))
            .spawn(move || run(id, &worker_queue, transport.as_ref(), &worker_quit))
            .map_err(QueueError::Spawn)?;

        Ok(Self { id, quit, queue, handle: Some(handle) })
    }

    /// Ask the loop to exit at its next wait. An exchange already running
    /// is not aborted.
    pub(crate) fn quit(&self) {
        self.quit.store(true, Ordering::Release);
        self.queue.interrupt();
    }

    pub(crate) fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(worker = self.id, "dispatcher thread panicked");
            }
        }
    }
}

fn run(id: usize, queue: &OrderedQueue<Arc<dyn Dispatchable>>, transport: &dyn Transport, quit: &AtomicBool) {
    debug!(worker = id, "dispatcher started");
    while let Some(request) = queue.take(quit) {
        telemetry::record_queue_depth(queue.len());
        dispatch(id, transport, request);
    }
    debug!(worker = id, "dispatcher stopped");
}

/// What a cycle produced for delivery.
enum Outcome {
    /// 304 for a request whose response was already delivered.
    NotModified,
    Success(Job),
    Failure(RequestError),
}

/// Run one request through a full cycle.
pub(crate) fn dispatch(worker: usize, transport: &dyn Transport, request: Arc<dyn Dispatchable>) {
    let outbound = request.outbound();
    let span = DispatchSpan::new(request.id(), outbound.method, &outbound.url, worker);
    let _entered = span.enter();
    debug!("picked up request");

    if request.is_canceled() {
        debug!("request canceled before dispatch");
        telemetry::record_canceled();
        request.finish();
        return;
    }
    if request.is_finished() {
        debug!("request released before dispatch, skipping");
        return;
    }

    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(transport, &request, &outbound, &span)))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(panic = %message, "request processing panicked");
            Outcome::Failure(RequestError::internal(format!("request processing panicked: {}", message)))
        });
    let elapsed = started.elapsed();
    span.record_latency(elapsed);
    telemetry::record_dispatch_latency(elapsed);

    match outcome {
        Outcome::NotModified => {
            debug!("not modified and already delivered, skipping");
            telemetry::record_not_modified();
            request.finish();
        }
        Outcome::Success(job) => {
            span.record("status", "ok");
            debug!("delivering success");
            telemetry::record_delivery_success();
            deliver(request.as_ref(), job);
        }
        Outcome::Failure(error) => {
            span.record_request_error(&error);
            debug!(error = %error, "delivering failure");
            telemetry::record_delivery_failure(error.kind());
            let job = Arc::clone(&request).error_job(error);
            deliver(request.as_ref(), job);
        }
    }
}

fn execute(
    transport: &dyn Transport,
    request: &Arc<dyn Dispatchable>,
    outbound: &OutboundRequest,
    span: &Span,
) -> Outcome {
    let mut response = match transport.perform(outbound) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "transport failed");
            let error = RequestError::transport(e);
            return Outcome::Failure(request.refine_error(error, None));
        }
    };
    span.record("http.status", response.status);

    if response.is_not_modified() && request.is_response_delivered() {
        return Outcome::NotModified;
    }
    request.mark_response_delivered();

    if response.is_error_status() {
        let error = RequestError::status(response.meta());
        return Outcome::Failure(request.refine_error(error, Some(&mut response)));
    }

    match Arc::clone(request).parse(&mut response) {
        Ok(job) => Outcome::Success(job),
        Err(error) => Outcome::Failure(error),
    }
    // `response` drops here on every path, closing the body stream.
}

fn deliver(request: &dyn Dispatchable, job: Job) {
    match request.target() {
        Some(target) => target.post(job),
        None => ImmediateTarget.post(job),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
