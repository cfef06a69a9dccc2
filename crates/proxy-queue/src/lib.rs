//! The FIFO request queue (§4.4) and the timeout utility (§4.5) it uses to
//! bound each attempt.

mod queue;
mod timeout;

pub use queue::{RequestQueue, RequestQueueConfig};
pub use timeout::with_timeout;
