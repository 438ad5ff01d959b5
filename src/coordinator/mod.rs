//! Polling coordinator
//!
//! - `snapshot`: Aggregate store merged by each cycle
//! - `pool`: Bounded worker pool for blocking API calls
//! - `refresh`: One refresh cycle with per-device failure isolation
//! - `scheduler`: Fixed-interval driver exposing the last result

pub mod pool;
pub mod refresh;
pub mod scheduler;
pub mod snapshot;

#[cfg(test)]
pub mod testing;

pub use pool::WorkerPool;
pub use refresh::{coordinator_name, RefreshCoordinator};
pub use scheduler::Scheduler;
