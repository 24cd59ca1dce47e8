//! Blocking retrieval of a request's result.
//!
//! A [`RequestFuture`] installs itself as the success and error listener of a
//! request, keeping any listeners the request already had as forwards, and
//! lets another thread wait for the outcome with an optional timeout.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::warn;

use crate::request::{Request, RequestError};

/// Why [`RequestFuture::get`] returned without a value.
#[derive(Debug, Clone, Error)]
pub enum FutureError {
    #[error("request failed: {0}")]
    Failed(RequestError),

    #[error("timed out after {0:?} waiting for response")]
    Timeout(Duration),

    #[error("timeout must not be negative, got {0}ms")]
    NegativeTimeout(i64),

    #[error("request was canceled")]
    Cancelled,
}

impl FutureError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

enum Slot<T> {
    Pending,
    Ready(T),
    Failed(RequestError),
    Cancelled,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Shared<T> {
    fn new() -> Self {
        Self { slot: Mutex::new(Slot::Pending), ready: Condvar::new() }
    }

    /// First outcome wins; later ones are ignored.
    fn complete(&self, outcome: Slot<T>) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = outcome;
            self.ready.notify_all();
        }
    }
}

/// Future-style handle to a request's outcome.
pub struct RequestFuture<T> {
    shared: Arc<Shared<T>>,
    request: Option<Arc<Request<T>>>,
}

impl<T: Clone + Send + 'static> RequestFuture<T> {
    /// A future with no request attached. It is never done and cannot be
    /// canceled until [`attach`](Self::attach) is called.
    pub fn new() -> Self {
        Self { shared: Arc::new(Shared::new()), request: None }
    }

    /// Install this future on `request` and attach it in one step.
    pub fn wrap(request: Request<T>) -> (Arc<Request<T>>, Self) {
        let mut future = Self::new();
        let request = Arc::new(future.install(request));
        future.attach(Arc::clone(&request));
        (request, future)
    }

    /// Make this future the listener of `request`.
    ///
    /// Listeners already set on the request are called first with each
    /// outcome, then the outcome is recorded here even if they panic.
    pub fn install(&self, mut request: Request<T>) -> Request<T> {
        let (forward_success, forward_error) = request.take_listeners();

        let shared = Arc::clone(&self.shared);
        request = request.on_success(move |value: T| {
            if let Some(forward) = &forward_success {
                let forwarded = value.clone();
                if panic::catch_unwind(AssertUnwindSafe(|| forward(forwarded))).is_err() {
                    warn!("forwarded success listener panicked");
                }
            }
            shared.complete(Slot::Ready(value));
        });

        let shared = Arc::clone(&self.shared);
        request = request.on_error(move |error: RequestError| {
            if let Some(forward) = &forward_error {
                let forwarded = error.clone();
                if panic::catch_unwind(AssertUnwindSafe(|| forward(forwarded))).is_err() {
                    warn!("forwarded error listener panicked");
                }
            }
            shared.complete(Slot::Failed(error));
        });

        let shared = Arc::clone(&self.shared);
        request.on_cancel(move || shared.complete(Slot::Cancelled))
    }

    /// Bind the request that [`cancel`](Self::cancel) acts on.
    pub fn attach(&mut self, request: Arc<Request<T>>) {
        self.request = Some(request);
    }

    pub fn request(&self) -> Option<&Arc<Request<T>>> {
        self.request.as_ref()
    }

    /// Wait for the outcome.
    ///
    /// `timeout_ms == 0` waits indefinitely; a negative value is rejected.
    /// An outcome recorded before the call returns immediately.
    pub fn get(&self, timeout_ms: i64) -> Result<T, FutureError> {
        if timeout_ms < 0 {
            return Err(FutureError::NegativeTimeout(timeout_ms));
        }
        let timeout = Duration::from_millis(timeout_ms as u64);
        let deadline = (timeout_ms > 0).then(|| Instant::now() + timeout);

        let mut slot = self.shared.slot.lock();
        loop {
            match &*slot {
                Slot::Ready(value) => return Ok(value.clone()),
                Slot::Failed(error) => return Err(FutureError::Failed(error.clone())),
                Slot::Cancelled => return Err(FutureError::Cancelled),
                Slot::Pending => {}
            }
            match deadline {
                None => self.shared.ready.wait(&mut slot),
                Some(deadline) => {
                    let timed_out = self.shared.ready.wait_until(&mut slot, deadline).timed_out();
                    if timed_out && matches!(*slot, Slot::Pending) {
                        return Err(FutureError::Timeout(timeout));
                    }
                }
            }
        }
    }

    /// Wait indefinitely.
    pub fn wait(&self) -> Result<T, FutureError> {
        self.get(0)
    }

    /// Cancel the attached request. Returns `false` without a request, or
    /// when the future is done or the request already canceled.
    pub fn cancel(&self) -> bool {
        match &self.request {
            Some(request) if !self.is_done() && !request.is_canceled() => request.cancel(),
            _ => false,
        }
    }

    /// A value, an error or a cancellation has been recorded.
    pub fn is_done(&self) -> bool {
        !matches!(*self.shared.slot.lock(), Slot::Pending)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.shared.slot.lock(), Slot::Cancelled)
    }
}

impl<T: Clone + Send + 'static> Default for RequestFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}
