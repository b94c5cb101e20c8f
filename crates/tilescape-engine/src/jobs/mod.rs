//! Frame-budgeted cooperative job queue.
//!
//! Expensive synchronous work (mesh construction) is queued and drained a
//! little every frame, so no single frame stalls. Intended usage:
//! - producers call [`JobQueue::enqueue`] with a receiver and a callback
//! - the host calls [`JobQueue::drain`] once per rendered frame

mod queue;

pub use queue::{DrainReport, JobQueue, JobQueueConfig};
