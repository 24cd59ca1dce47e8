//! Delivery onto a tokio runtime.

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedSender};

use super::{run_job, DeliveryTarget, Job};

/// Runs jobs on a tokio runtime, one at a time, in posting order.
///
/// A single drain task owns the receiving end, so listeners for requests
/// sharing this target never run concurrently with each other.
#[derive(Clone)]
pub struct RuntimeTarget {
    sender: UnboundedSender<Job>,
}

impl RuntimeTarget {
    pub fn new(handle: &Handle) -> Self {
        let (sender, mut rx) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                run_job(job, "runtime");
            }
        });
        Self { sender }
    }

    /// Target on the runtime the caller is running in, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(|h| Self::new(&h))
    }
}

impl DeliveryTarget for RuntimeTarget {
    fn post(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!("runtime delivery task gone, job dropped");
        }
    }
}
