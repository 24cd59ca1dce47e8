//! Dedicated delivery thread.

use std::io;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedSender};

use super::{run_job, DeliveryTarget, Job};

/// A named OS thread draining a FIFO of jobs.
///
/// Plays the role of a caller's event loop: every listener posted here runs
/// on the same thread, one at a time, in posting order.
pub struct DeliveryThread {
    name: String,
    sender: Mutex<Option<UnboundedSender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryThread {
    pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            tracing::debug!(thread = %thread_name, "delivery thread started");
            while let Some(job) = rx.blocking_recv() {
                run_job(job, &thread_name);
            }
            tracing::debug!(thread = %thread_name, "delivery thread stopped");
        })?;

        Ok(Self {
            name,
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop accepting jobs, run what is already queued, and join.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::warn!(thread = %self.name, "delivery thread panicked");
            }
        }
    }
}

impl DeliveryTarget for DeliveryThread {
    fn post(&self, job: Job) {
        let sender = self.sender.lock();
        match sender.as_ref() {
            // A job that cannot be queued is dropped, which still releases
            // its request from the queue.
            Some(tx) => {
                if tx.send(job).is_err() {
                    tracing::warn!(thread = %self.name, "delivery thread gone, job dropped");
                }
            }
            None => tracing::warn!(thread = %self.name, "delivery thread shut down, job dropped"),
        }
    }
}

impl Drop for DeliveryThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
