//! Requests accepted by a queue and not yet released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::request::{Dispatchable, RequestId};

/// The in-flight set. One lock guards insert, remove and iteration; it is
/// never held across transport or listener calls.
#[derive(Default)]
pub(crate) struct InFlight {
    requests: Mutex<HashMap<RequestId, Arc<dyn Dispatchable>>>,
    finished: AtomicU64,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, request: Arc<dyn Dispatchable>) {
        self.requests.lock().insert(request.id(), request);
    }

    /// Remove `id`; absent ids are ignored.
    pub(crate) fn remove(&self, id: RequestId) -> bool {
        // Bind first so the request is dropped after the lock is released.
        let removed = self.requests.lock().remove(&id);
        if removed.is_none() {
            return false;
        }
        self.finished.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Requests tracked at the moment of the call.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Dispatchable>> {
        self.requests.lock().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn finished_total(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }
}
