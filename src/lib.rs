// src/lib.rs
//! syncnode library — harvests a time-ordered, paginated record feed into a
//! durable store, backfilling history and tailing new data.
//!
//! # Public API
//!
//! The library exposes types organized by concern:
//! - **Error handling** — `AppError`, `FeedErrorCode`
//! - **Configuration** — `SyncConfig`, `CommandLineInput`
//! - **Domain types** — `Timestamp`, `BlockId`, `ApiKey`, `Chain`,
//!   `Dataset`, `Record`
//! - **Feed client** — `FeedSource`, `FeedHttpClient`, `FeedPage`
//! - **Scheduler** — `Controller`, `WorkerPool`, `BlockQueue`, `Block`,
//!   worker entry points
//! - **Sink** — `RecordSink`, `MemoryStore`

mod config;
mod constants;
mod error;
mod feed;
mod scheduler;
mod sink;
mod types;

// --- Error Handling ---
pub use crate::error::{AppError, FeedErrorCode, Result};

// --- Configuration ---
pub use crate::config::{CommandLineInput, SyncConfig};

// --- Domain Constants ---
pub use crate::constants::{
    DENSITY_THRESHOLD_MILLIS, FEED_PAGE_SIZE, RETRY_DELAY_MILLIS, TAIL_INTERVAL_MILLIS,
};

// --- Domain Types ---
pub use crate::types::{ApiKey, BlockId, Chain, Dataset, Record, Timestamp};

// --- Feed Client ---
pub use crate::feed::{build_query, FeedHttpClient, FeedPage, FeedSource, SortDirection};

// --- Scheduler ---
pub use crate::scheduler::{
    is_high_density, middle_timestamp, run_tail, run_worker, Block, BlockQueue, Controller,
    PoolSignal, SplitNotice, WorkerContext, WorkerEvent, WorkerPool,
};

// --- Sink ---
pub use crate::sink::{MemoryStore, RecordSink};
