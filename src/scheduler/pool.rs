// src/scheduler/pool.rs
//! The worker pool: fixed set of workers, one assignment loop.
//!
//! The pool is the single consumer of worker lifecycle events and the sole
//! producer of assignment commands. Because both take-next and hand-off run
//! inside one loop, take-and-assign is serialized — no two workers can ever
//! receive the same block.

use super::block::Block;
use super::queue::BlockQueue;
use super::worker::{run_worker, WorkerContext, WorkerEvent};
use crate::feed::FeedSource;
use crate::sink::RecordSink;
use crate::types::Timestamp;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Notice relayed to the controller when a worker discovers a dense
/// sub-range that must become its own queued block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitNotice {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Signal from the controller that new work has been queued.
#[derive(Debug)]
pub enum PoolSignal {
    WorkAvailable,
}

/// One worker's seat in the pool: its assignment channel and busy flag.
struct WorkerSlot {
    id: usize,
    assignments: mpsc::Sender<Block>,
    busy: bool,
}

/// Owns the workers and matches them to queued blocks.
pub struct WorkerPool {
    queue: Arc<BlockQueue>,
    slots: Vec<WorkerSlot>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    signals: mpsc::UnboundedReceiver<PoolSignal>,
    splits: mpsc::UnboundedSender<SplitNotice>,
}

impl WorkerPool {
    /// Spawns `size` worker tasks and assembles the pool around them.
    ///
    /// Returns the pool plus a clone of the worker event sender, so the
    /// designated tail worker can emit through the same relay.
    pub fn spawn(
        size: usize,
        queue: Arc<BlockQueue>,
        feed: Arc<dyn FeedSource>,
        sink: Arc<dyn RecordSink>,
        retry_delay: Duration,
        signals: mpsc::UnboundedReceiver<PoolSignal>,
        splits: mpsc::UnboundedSender<SplitNotice>,
    ) -> (Self, mpsc::UnboundedSender<WorkerEvent>) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let mut slots = Vec::with_capacity(size);

        for id in 0..size {
            // Capacity 1: an idle worker's channel is always empty, so
            // try_send from dispatch cannot spuriously fail.
            let (assign_tx, assign_rx) = mpsc::channel(1);
            let ctx = WorkerContext {
                id,
                feed: Arc::clone(&feed),
                sink: Arc::clone(&sink),
                events: event_tx.clone(),
                retry_delay,
            };
            tokio::spawn(run_worker(ctx, assign_rx));
            slots.push(WorkerSlot {
                id,
                assignments: assign_tx,
                busy: false,
            });
        }

        let pool = Self {
            queue,
            slots,
            events,
            signals,
            splits,
        };
        (pool, event_tx)
    }

    /// Runs the assignment loop until every channel into the pool closes.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(WorkerEvent::Split { worker_id, start, end }) => {
                        log::debug!(
                            "Relaying split [{}, {}] from worker {}",
                            start, end, worker_id
                        );
                        if self.splits.send(SplitNotice { start, end }).is_err() {
                            break;
                        }
                    }
                    Some(WorkerEvent::Released { worker_id, block }) => {
                        log::info!("Worker {} released block {}", worker_id, block.id);
                        if let Some(slot) =
                            self.slots.iter_mut().find(|s| s.id == worker_id)
                        {
                            slot.busy = false;
                        }
                        self.dispatch();
                    }
                    None => break,
                },
                signal = self.signals.recv() => match signal {
                    Some(PoolSignal::WorkAvailable) => self.dispatch(),
                    None => break,
                },
            }
        }
        log::debug!("Pool loop exiting");
    }

    /// Hands queued blocks to idle workers, one per worker.
    fn dispatch(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| !s.busy) {
            let Some(block) = self.queue.take_next() else {
                break;
            };
            log::debug!("Assigning block {} to worker {}", block.id, slot.id);
            match slot.assignments.try_send(block) {
                Ok(()) => slot.busy = true,
                Err(mpsc::error::TrySendError::Full(block))
                | Err(mpsc::error::TrySendError::Closed(block)) => {
                    // The worker task is gone; ownership returns to the
                    // queue rather than being lost with it.
                    self.queue.insert(block);
                }
            }
        }
    }
}
