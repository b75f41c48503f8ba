// src/scheduler/mod.rs
//! The adaptive time-range partitioning scheduler.
//!
//! Blocks describe units of work, the queue holds pending blocks, workers
//! grain and paginate them, the pool matches idle workers to queued blocks,
//! and the controller turns worker signals back into queued work. Every
//! cross-component interaction is a message over a channel.

pub mod block;
pub mod controller;
pub mod pool;
pub mod queue;
pub mod worker;

pub use block::{is_high_density, middle_timestamp, Block};
pub use controller::Controller;
pub use pool::{PoolSignal, SplitNotice, WorkerPool};
pub use queue::BlockQueue;
pub use worker::{run_tail, run_worker, WorkerContext, WorkerEvent};
