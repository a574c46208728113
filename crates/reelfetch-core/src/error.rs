//! Typed errors of the core, gathered in one place for callers.
//!
//! Each component owns its error type next to its code; nothing here is
//! process-fatal. Callers decide whether a failure aborts the overall task.

pub use crate::cache::CacheError;
pub use crate::scheduler::SchedulerError;
pub use crate::transport::TransportError;
pub use crate::worker::{PoolStopped, TaskLost};
