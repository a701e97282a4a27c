//! Bounded concurrent execution of review tasks.
//!
//! The [`WorkerPool`] drains a bounded task queue with a fixed number of
//! workers, delivering one [`TaskResult`] per submitted [`Task`]. The queue
//! bound is the system's backpressure mechanism: `submit` blocks on a full
//! queue instead of growing memory without limit.
//!
//! Cancellation is cooperative. A single shared token, tripped by
//! [`WorkerPool::stop`], is observed before dequeuing, inside well-behaved
//! task bodies, and before publishing a result — so no worker can block
//! forever on a torn-down pool, but a task that never polls the token runs
//! to completion.

pub mod pool;
pub mod task;

pub use pool::{PoolStats, WorkerPool};
pub use task::{BatchTask, FileReviewTask, FnTask, Task, TaskResult};
