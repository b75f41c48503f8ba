// src/scheduler/queue.rs
//! The pending set of blocks awaiting a free worker.
//!
//! Insertion order carries no meaning — any pending block may be taken next.
//! What the queue does guarantee is that `take_next` is atomic with respect
//! to concurrent inserts and other takes: the pop is the single
//! serialization point through which block ownership transfers, so two
//! workers can never be handed the same block.

use super::block::Block;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Concurrent-safe pending set of blocks.
#[derive(Default)]
pub struct BlockQueue {
    pending: Mutex<VecDeque<Block>>,
}

impl BlockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a block to the pending set.
    pub fn insert(&self, block: Block) {
        log::debug!(
            "Queued block {} [{}, {}]",
            block.id,
            block.start,
            block.end
        );
        self.pending.lock().push_back(block);
    }

    /// Atomically removes and returns one pending block, if any.
    pub fn take_next(&self) -> Option<Block> {
        self.pending.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
