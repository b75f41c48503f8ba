// src/scheduler/controller.rs
//! The controller: bootstrap, split materialization, and wiring.
//!
//! The controller is the only component that mutates the queue from the
//! outside. It probes the feed for its coverage bounds, seeds the initial
//! full-range block, and for every split notice mints a fresh block and
//! tells the pool that work is available. Everything else happens inside
//! the pool and its workers.

use super::block::Block;
use super::pool::{PoolSignal, SplitNotice, WorkerPool};
use super::queue::BlockQueue;
use super::worker::{run_tail, WorkerContext};
use crate::config::SyncConfig;
use crate::error::{AppError, FeedErrorCode, Result};
use crate::feed::{FeedPage, FeedSource, SortDirection};
use crate::sink::RecordSink;
use crate::types::Record;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Orchestrates the queue, the pool, and the tail worker for one dataset.
pub struct Controller {
    config: SyncConfig,
    feed: Arc<dyn FeedSource>,
    sink: Arc<dyn RecordSink>,
}

impl Controller {
    pub fn new(config: SyncConfig, feed: Arc<dyn FeedSource>, sink: Arc<dyn RecordSink>) -> Self {
        Self { config, feed, sink }
    }

    /// Discovers the feed's coverage bounds and builds the initial
    /// full-range block.
    ///
    /// Failure of either probe is fatal: the system cannot start without
    /// knowing where its coverage begins and ends.
    pub async fn bootstrap_block(&self) -> Result<Block> {
        let ascending = self.probe(SortDirection::Ascending).await.map_err(|e| {
            AppError::BootstrapFailed(format!("ascending probe failed: {}", e))
        })?;
        let descending = self.probe(SortDirection::Descending).await.map_err(|e| {
            AppError::BootstrapFailed(format!("descending probe failed: {}", e))
        })?;

        let oldest = ascending
            .records
            .first()
            .and_then(Record::updated_at)
            .ok_or_else(|| {
                AppError::BootstrapFailed("ascending probe returned no usable records".to_string())
            })?;
        // The descending page leads with the newest record overall.
        let newest = descending
            .records
            .first()
            .and_then(Record::updated_at)
            .ok_or_else(|| {
                AppError::BootstrapFailed("descending probe returned no usable records".to_string())
            })?;

        if newest < oldest {
            return Err(AppError::BootstrapFailed(format!(
                "probes disagree on coverage bounds: oldest {} > newest {}",
                oldest, newest
            )));
        }

        Block::new(
            oldest,
            newest,
            self.config.contract.clone(),
            self.config.dataset,
        )
    }

    /// One unfiltered bootstrap probe.
    async fn probe(&self, direction: SortDirection) -> Result<FeedPage> {
        let page = self
            .feed
            .fetch_page(self.config.dataset, direction, &[])
            .await?;
        if !page.is_success() {
            let code = page
                .error
                .clone()
                .unwrap_or_else(|| FeedErrorCode::from_http_status(page.status));
            return Err(AppError::FeedService {
                message: format!("{} probe rejected", direction.as_str()),
                status: page.status,
                code,
            });
        }
        Ok(page)
    }

    /// Bootstraps and then runs the harvester until the process exits.
    pub async fn run(self) -> Result<()> {
        let initial = self.bootstrap_block().await?;
        log::info!(
            "Coverage bounds for {}: [{}, {}]",
            self.config.dataset,
            initial.start,
            initial.end
        );
        // The tail takes over where the backfill's coverage ends.
        let tail_from = initial.end;

        let queue = Arc::new(BlockQueue::new());
        queue.insert(initial);

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (split_tx, mut split_rx) = mpsc::unbounded_channel::<SplitNotice>();

        let (pool, event_tx) = WorkerPool::spawn(
            self.config.workers,
            Arc::clone(&queue),
            Arc::clone(&self.feed),
            Arc::clone(&self.sink),
            self.config.retry_delay,
            signal_rx,
            split_tx,
        );
        tokio::spawn(pool.run());

        // The designated tail worker emits through the same relay as the
        // pool's workers, so its burst splits land in the queue like any
        // other.
        let tail_ctx = WorkerContext {
            id: self.config.workers,
            feed: Arc::clone(&self.feed),
            sink: Arc::clone(&self.sink),
            events: event_tx,
            retry_delay: self.config.retry_delay,
        };
        tokio::spawn(run_tail(
            tail_ctx,
            self.config.dataset,
            self.config.tail_interval,
            tail_from,
        ));

        // Kick the pool to pick up the initial block.
        let _ = signal_tx.send(PoolSignal::WorkAvailable);

        // Split materialization: the controller's forever loop.
        while let Some(notice) = split_rx.recv().await {
            let block = Block::new(notice.start, notice.end, None, self.config.dataset)?;
            log::debug!(
                "Materialized split [{}, {}] as block {}",
                notice.start,
                notice.end,
                block.id
            );
            queue.insert(block);
            let _ = signal_tx.send(PoolSignal::WorkAvailable);
        }

        Ok(())
    }
}
