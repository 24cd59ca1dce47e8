//! Request queue management.
//!
//! [`RequestQueue`] owns the ordered queue, the in-flight set and the
//! dispatcher pool. Submission is safe from any number of threads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use super::dispatcher::{Dispatcher, SharedQueue};
use super::in_flight::InFlight;
use super::ordered::OrderedQueue;
use crate::delivery::DeliveryTarget;
use crate::request::{Dispatchable, QueueError, Request};
use crate::telemetry;
use crate::transport::Transport;

/// Worker count used when none is configured.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Configuration for request queue.
#[derive(Debug, Clone)]
pub struct RequestQueueConfig {
    pub worker_count: usize,
}

impl Default for RequestQueueConfig {
    fn default() -> Self {
        Self { worker_count: DEFAULT_WORKER_COUNT }
    }
}

/// Point-in-time counters for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub submitted: u64,
    pub finished: u64,
    pub in_flight: usize,
    pub pending: usize,
    pub workers: usize,
}

/// Prioritized request queue served by a pool of dispatcher threads.
pub struct RequestQueue {
    config: RequestQueueConfig,
    transport: Arc<dyn Transport>,
    default_target: Arc<dyn DeliveryTarget>,
    queue: SharedQueue,
    in_flight: Arc<InFlight>,
    sequence: AtomicU64,
    submitted: AtomicU64,
    dispatchers: Mutex<Vec<Dispatcher>>,
    running: AtomicBool,
}

impl RequestQueue {
    /// Build a stopped queue. `default_target` receives deliveries for
    /// requests submitted without an explicit target.
    pub fn new(
        transport: Arc<dyn Transport>,
        default_target: Arc<dyn DeliveryTarget>,
        config: RequestQueueConfig,
    ) -> Self {
        Self {
            config,
            transport,
            default_target,
            queue: Arc::new(OrderedQueue::new()),
            in_flight: Arc::new(InFlight::new()),
            sequence: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            dispatchers: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Start the configured number of dispatchers.
    pub fn start(&self) -> Result<(), QueueError> {
        self.start_with(self.config.worker_count)
    }

    /// Start `worker_count` dispatchers, stopping any running ones first.
    pub fn start_with(&self, worker_count: usize) -> Result<(), QueueError> {
        if worker_count == 0 {
            return Err(QueueError::NoWorkers);
        }
        let mut dispatchers = self.dispatchers.lock();
        if self.running.load(Ordering::Acquire) {
            Self::signal_quit(&mut dispatchers);
        }

        for id in 0..worker_count {
            match Dispatcher::spawn(id, Arc::clone(&self.queue), Arc::clone(&self.transport)) {
                Ok(dispatcher) => dispatchers.push(dispatcher),
                Err(e) => {
                    Self::signal_quit(&mut dispatchers);
                    self.running.store(false, Ordering::Release);
                    return Err(e);
                }
            }
        }
        self.running.store(true, Ordering::Release);
        info!(workers = worker_count, "request queue started");
        Ok(())
    }

    /// Signal every dispatcher to quit at its next wait.
    ///
    /// Queued requests stay queued and are picked up after a restart.
    pub fn stop(&self) {
        let mut dispatchers = self.dispatchers.lock();
        Self::signal_quit(&mut dispatchers);
        self.running.store(false, Ordering::Release);
        info!("request queue stopped");
    }

    /// Like [`stop`](Self::stop), then wait for dispatcher threads to exit.
    pub fn stop_and_join(&self) {
        let dispatchers = {
            let mut dispatchers = self.dispatchers.lock();
            for dispatcher in dispatchers.iter() {
                dispatcher.quit();
            }
            self.running.store(false, Ordering::Release);
            std::mem::take(&mut *dispatchers)
        };
        for dispatcher in dispatchers {
            dispatcher.join();
        }
        info!("request queue stopped and joined");
    }

    fn signal_quit(dispatchers: &mut Vec<Dispatcher>) {
        for dispatcher in dispatchers.drain(..) {
            dispatcher.quit();
        }
    }

    /// Submit `request` for delivery on the default target.
    pub fn submit<T: Send + 'static>(
        &self,
        request: Arc<Request<T>>,
    ) -> Result<Arc<Request<T>>, QueueError> {
        self.submit_on(request, Arc::clone(&self.default_target))
    }

    /// Submit `request`; its listeners will run on `target`.
    pub fn submit_on<T: Send + 'static>(
        &self,
        request: Arc<Request<T>>,
        target: Arc<dyn DeliveryTarget>,
    ) -> Result<Arc<Request<T>>, QueueError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        request.bind(Arc::downgrade(&self.in_flight), target, sequence)?;

        let erased: Arc<dyn Dispatchable> = request.clone();
        self.in_flight.insert(Arc::clone(&erased));
        self.queue.push(erased, request.priority(), sequence);

        self.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(request_id = %request.id(), sequence, priority = ?request.priority(), "request submitted");
        telemetry::record_submitted();
        telemetry::record_queue_depth(self.queue.len());
        Ok(request)
    }

    /// Cancel every request currently in flight. Canceled requests are
    /// released by their dispatcher or delivery job, not here.
    pub fn cancel_all(&self) -> usize {
        let requests = self.in_flight.snapshot();
        let canceled = requests.iter().filter(|r| r.cancel()).count();
        info!(canceled, "canceled all in-flight requests");
        canceled
    }

    /// Release `request` from the in-flight set. Releasing twice is a no-op.
    ///
    /// A request released while still queued is skipped by the dispatchers.
    pub fn finish<T>(&self, request: &Request<T>) -> bool {
        request.finish()
    }

    /// Cancel and release every request still waiting in the queue.
    ///
    /// Meant for after [`stop_and_join`](Self::stop_and_join); requests a
    /// running dispatcher already took are not touched.
    pub fn drain_pending(&self) -> usize {
        let mut drained = 0;
        while let Some(request) = self.queue.try_take() {
            if request.cancel() {
                telemetry::record_canceled();
            }
            request.finish();
            drained += 1;
        }
        telemetry::record_queue_depth(self.queue.len());
        if drained > 0 {
            info!(drained, "released queued requests");
        }
        drained
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.dispatchers.lock().len()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            finished: self.in_flight.finished_total(),
            in_flight: self.in_flight_count(),
            pending: self.pending_count(),
            workers: self.worker_count(),
        }
    }
}

impl Drop for RequestQueue {
    fn drop(&mut self) {
        Self::signal_quit(self.dispatchers.get_mut());
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
