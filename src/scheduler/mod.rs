//! Request scheduling.
//!
//! Priority ordering, the blocking queue the dispatchers share, the
//! dispatcher threads themselves, and the [`RequestQueue`] that ties them
//! together.

mod dispatcher;
mod in_flight;
mod ordered;
mod priority;
mod queue;

pub(crate) use in_flight::InFlight;
pub use ordered::OrderedQueue;
pub use priority::{Priority, PriorityQueue};
pub use queue::{QueueStats, RequestQueue, RequestQueueConfig, DEFAULT_WORKER_COUNT};
