//! Courier request dispatcher
//!
//! A client-side HTTP request queue. Callers submit typed requests from any
//! thread; a fixed pool of dispatcher threads performs the exchanges in
//! priority order and posts each outcome to the request's delivery target.
//!
//! # Components
//!
//! - **Queue**: priority-then-FIFO ordering, an in-flight set for bulk
//!   cancellation, start/stop of the dispatcher pool
//! - **Dispatcher**: one blocking exchange at a time per worker; failures are
//!   delivered as errors and never end the worker loop
//! - **Delivery**: listeners run on a dedicated thread, a tokio runtime, or
//!   inline
//! - **Future**: blocking `get(timeout)` on top of the listener pair
//!
//! # Guarantees
//!
//! - Each request reaches exactly one of: success listener, error listener,
//!   or nothing (canceled).
//! - Each accepted request is released from the in-flight set exactly once.
//! - A response body is closed at the end of every dispatch cycle.

pub mod cli;
pub mod config;
pub mod delivery;
pub mod future;
pub mod request;
pub mod scheduler;
pub mod telemetry;
pub mod transport;

use std::sync::Arc;

use thiserror::Error;

pub use delivery::{DeliveryTarget, DeliveryThread, ImmediateTarget, Job, RuntimeTarget};
pub use future::{FutureError, RequestFuture};
pub use request::{ErrorKind, QueueError, Request, RequestError, RequestId, ResponseParser};
pub use scheduler::{Priority, QueueStats, RequestQueue, RequestQueueConfig};
pub use transport::{Method, RawResponse, ReqwestTransport, Transport, TransportConfig, TransportError};

/// Name of the delivery thread owned by [`Courier`].
pub const DELIVERY_THREAD_NAME: &str = "courier-delivery";

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct CourierConfig {
    pub queue: RequestQueueConfig,
    pub transport: TransportConfig,
}

impl From<&config::EnvConfig> for CourierConfig {
    fn from(env: &config::EnvConfig) -> Self {
        Self {
            queue: env.queue_config(),
            transport: env.transport_config(),
        }
    }
}

/// Failures while assembling a [`Courier`].
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("failed to spawn delivery thread: {0}")]
    Delivery(#[source] std::io::Error),
}

/// A queue wired to a transport and a dedicated delivery thread.
pub struct Courier {
    pub queue: Arc<RequestQueue>,
    pub delivery: Arc<DeliveryThread>,
}

impl Courier {
    /// Build a stopped courier over a reqwest client.
    ///
    /// Must not be called from inside an async runtime: the blocking client
    /// owns its own runtime.
    pub fn new(config: CourierConfig) -> Result<Self, CourierError> {
        let transport = ReqwestTransport::new(config.transport)?;
        Self::with_transport(Arc::new(transport), config.queue)
    }

    /// Build a stopped courier over any transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        queue: RequestQueueConfig,
    ) -> Result<Self, CourierError> {
        let delivery = Arc::new(DeliveryThread::spawn(DELIVERY_THREAD_NAME).map_err(CourierError::Delivery)?);
        let target: Arc<dyn DeliveryTarget> = delivery.clone();
        let queue = Arc::new(RequestQueue::new(transport, target, queue));
        Ok(Self { queue, delivery })
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    pub fn start(&self) -> Result<(), CourierError> {
        self.queue.start()?;
        Ok(())
    }

    /// Submit `request` and return a future for its outcome.
    pub fn fetch<T: Clone + Send + 'static>(
        &self,
        request: Request<T>,
    ) -> Result<RequestFuture<T>, CourierError> {
        let (request, future) = RequestFuture::wrap(request);
        self.queue.submit(request)?;
        Ok(future)
    }

    /// Cancel everything in flight, stop the dispatchers, release what is
    /// still queued and drain the delivery thread.
    pub fn shutdown(&self) {
        self.queue.cancel_all();
        self.queue.stop_and_join();
        self.queue.drain_pending();
        self.delivery.shutdown();
    }
}
