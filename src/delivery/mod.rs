//! Execution contexts that run delivery callbacks.
//!
//! Dispatchers never call listeners directly; they post a [`Job`] onto the
//! request's [`DeliveryTarget`]. Jobs posted to one target run in posting
//! order.

mod runtime;
mod thread;

pub use runtime::RuntimeTarget;
pub use thread::DeliveryThread;

/// A delivery callback: listener invocation followed by request release.
pub type Job = Box<dyn FnOnce() + Send>;

/// Where a request's callbacks execute.
pub trait DeliveryTarget: Send + Sync {
    /// Enqueue `job`. Fire-and-forget.
    fn post(&self, job: Job);
}

/// Runs jobs inline on the posting thread.
///
/// Listeners then execute on the dispatcher thread itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateTarget;

impl DeliveryTarget for ImmediateTarget {
    fn post(&self, job: Job) {
        run_job(job, "immediate");
    }
}

fn run_job(job: Job, target: &str) {
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).is_err() {
        tracing::warn!(target_name = target, "delivery callback panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_immediate_runs_inline() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        ImmediateTarget.post(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_job_contains_panics() {
        run_job(Box::new(|| panic!("listener bug")), "test");
    }
}
