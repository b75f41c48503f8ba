// src/scheduler/worker.rs
//! Worker execution: the grain → process → release state machine and the
//! unending tail loop.
//!
//! A worker owns exactly one block at a time. Graining is a binary-search
//! partition driven by observed density rather than a static grid: the
//! worker probes both ends of its range, and while the sample is too dense
//! it halves the range, emitting a split for the upper half and keeping the
//! lower. The ascending boundary page is reused across graining iterations —
//! it does not change while only the end boundary moves. Once the range is
//! acceptably sparse, the worker pages through it ascending and releases.

use super::block::{is_high_density, middle_timestamp, Block};
use crate::constants::DENSITY_THRESHOLD_MILLIS;
use crate::feed::{FeedPage, FeedSource, SortDirection};
use crate::sink::RecordSink;
use crate::types::{Dataset, Record, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Lifecycle messages a worker emits toward the pool.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A dense sub-range was carved off and must become its own block.
    Split {
        worker_id: usize,
        start: Timestamp,
        end: Timestamp,
    },
    /// The worker finished (or abandoned) its block and is idle again.
    Released { worker_id: usize, block: Block },
}

/// The narrow capability set a worker operates through: feed access, the
/// sink, its event channel, and pacing. Passed at construction — a worker
/// never holds a handle to the controller.
#[derive(Clone)]
pub struct WorkerContext {
    pub id: usize,
    pub feed: Arc<dyn FeedSource>,
    pub sink: Arc<dyn RecordSink>,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
    /// Pause before retrying an application-level failure.
    pub retry_delay: Duration,
}

/// What graining decided to do with the (possibly shrunk) range.
enum GrainOutcome {
    /// Density is acceptable: paginate the owned range in full.
    Paginate,
    /// Nothing to do, or the range is dense but unsplittable: release now.
    Release,
}

/// Runs one worker: receives assignments until its channel closes,
/// executing the grain → process → release machine per block.
pub async fn run_worker(ctx: WorkerContext, mut assignments: mpsc::Receiver<Block>) {
    while let Some(block) = assignments.recv().await {
        log::info!(
            "Worker {} grains block {} [{}, {}]",
            ctx.id,
            block.id,
            block.start,
            block.end
        );
        let block = work_block(&ctx, block).await;

        // Releasing: the continuation cursor is local to the processing
        // phase and already dropped; announce idleness.
        if ctx
            .events
            .send(WorkerEvent::Released {
                worker_id: ctx.id,
                block,
            })
            .is_err()
        {
            break;
        }
    }
    log::debug!("Worker {} shutting down", ctx.id);
}

async fn work_block(ctx: &WorkerContext, mut block: Block) -> Block {
    match grain(ctx, &mut block).await {
        GrainOutcome::Paginate => paginate(ctx, &block).await,
        GrainOutcome::Release => {}
    }
    block
}

/// Graining phase: density-driven bisection of the owned range.
async fn grain(ctx: &WorkerContext, block: &mut Block) -> GrainOutcome {
    let ascending = fetch_until_success(
        ctx,
        block.dataset,
        SortDirection::Ascending,
        &range_params(block),
    )
    .await;

    if ascending.records.is_empty() {
        log::debug!(
            "Worker {}: range [{}, {}] holds no records, releasing",
            ctx.id,
            block.start,
            block.end
        );
        return GrainOutcome::Release;
    }

    loop {
        // The descending boundary moves as the end shrinks; the ascending
        // page stays valid because the start never does.
        let descending = fetch_until_success(
            ctx,
            block.dataset,
            SortDirection::Descending,
            &range_params(block),
        )
        .await;

        let mut sample = ascending.records.clone();
        sample.extend(descending.records);
        if let Err(e) = ctx.sink.upsert(block.dataset, &sample).await {
            log::warn!("Worker {}: sink rejected graining sample: {}", ctx.id, e);
        }

        if !is_high_density(&sample, DENSITY_THRESHOLD_MILLIS) {
            return GrainOutcome::Paginate;
        }

        let mid = middle_timestamp(block.start, block.end);
        if mid == block.start || mid == block.end {
            // Granularity floor: the range is dense but cannot be halved
            // again at millisecond resolution.
            log::warn!(
                "Worker {}: block {} [{}, {}] is dense but unsplittable, forcing release",
                ctx.id,
                block.id,
                block.start,
                block.end
            );
            return GrainOutcome::Release;
        }

        log::info!(
            "Worker {}: splitting off [{}, {}], keeping [{}, {}]",
            ctx.id,
            mid,
            block.end,
            block.start,
            mid
        );
        if ctx
            .events
            .send(WorkerEvent::Split {
                worker_id: ctx.id,
                start: mid,
                end: block.end,
            })
            .is_err()
        {
            return GrainOutcome::Release;
        }
        block.end = mid;
    }
}

/// Processing phase: full ascending pagination of the grained range.
///
/// The continuation cursor only ever advances on a successful page carrying
/// one; a failed request retries the identical logical step.
async fn paginate(ctx: &WorkerContext, block: &Block) {
    let mut cursor: Option<String> = None;
    loop {
        let mut params = range_params(block);
        if let Some(continuation) = &cursor {
            params.push(("continuation".to_string(), continuation.clone()));
        }

        let page =
            fetch_until_success(ctx, block.dataset, SortDirection::Ascending, &params).await;
        if page.records.is_empty() {
            break;
        }

        if let Err(e) = ctx.sink.upsert(block.dataset, &page.records).await {
            log::warn!("Worker {}: sink rejected page: {}", ctx.id, e);
        }

        match page.continuation {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
}

/// The tail loop: a single designated worker scanning forward from the head
/// of the feed, forever.
///
/// The tail never blocks on catch-up work. When a tick returns more than one
/// page's worth of new data (a burst), the historical span of that page is
/// delegated to the backfill pool as a split, and the tail advances past it.
pub async fn run_tail(
    ctx: WorkerContext,
    dataset: Dataset,
    interval: Duration,
    mut from: Timestamp,
) {
    log::info!("Tail worker {} starting from {}", ctx.id, from);
    loop {
        tokio::time::sleep(interval).await;

        let page = match ctx
            .feed
            .fetch_page(dataset, SortDirection::Ascending, &tail_params(from))
            .await
        {
            Ok(page) if page.is_success() => page,
            Ok(page) => {
                log::warn!(
                    "Tail fetch answered {} ({:?}), skipping tick",
                    page.status,
                    page.error
                );
                continue;
            }
            Err(e) => {
                log::warn!("Tail fetch failed: {}, skipping tick", e);
                continue;
            }
        };

        if page.records.is_empty() {
            continue;
        }

        // Pure tailing path: records go straight to storage, not through
        // the block pipeline.
        if let Err(e) = ctx.sink.upsert(dataset, &page.records).await {
            log::warn!("Tail sink rejected records: {}", e);
        }

        if page.continuation.is_none() {
            // Caught up to the head of the feed.
            continue;
        }

        // Burst: the feed produced more than one page this tick. Probe
        // density from "now" backward before deciding to delegate.
        let probe = match ctx
            .feed
            .fetch_page(
                dataset,
                SortDirection::Descending,
                &tail_params(Timestamp::now()),
            )
            .await
        {
            Ok(probe) if probe.is_success() => probe,
            _ => continue,
        };

        let mut sample = page.records.clone();
        sample.extend(probe.records);
        if !is_high_density(&sample, DENSITY_THRESHOLD_MILLIS) {
            continue;
        }

        let first = page.records.first().and_then(Record::updated_at);
        let last = page.records.last().and_then(Record::updated_at);
        let (Some(first), Some(last)) = (first, last) else {
            continue;
        };
        if first > last {
            continue;
        }

        log::info!(
            "Tail burst: delegating [{}, {}] to the backfill pool",
            first,
            last
        );
        if ctx
            .events
            .send(WorkerEvent::Split {
                worker_id: ctx.id,
                start: first,
                end: last,
            })
            .is_err()
        {
            return;
        }
        // Don't re-walk the range we just delegated.
        from = last;
    }
}

/// Retries one page fetch until the feed answers with application success.
///
/// Transport faults never reach here (the client retries them in place);
/// application failures wait the fixed delay and retry the identical
/// request, so no continuation state is skipped.
async fn fetch_until_success(
    ctx: &WorkerContext,
    dataset: Dataset,
    direction: SortDirection,
    params: &[(String, String)],
) -> FeedPage {
    loop {
        match ctx.feed.fetch_page(dataset, direction, params).await {
            Ok(page) if page.is_success() => return page,
            Ok(page) => {
                log::warn!(
                    "Worker {}: feed answered {} ({:?}), retrying in {:?}",
                    ctx.id,
                    page.status,
                    page.error,
                    ctx.retry_delay
                );
            }
            Err(e) => {
                log::warn!(
                    "Worker {}: fetch failed: {}, retrying in {:?}",
                    ctx.id,
                    e,
                    ctx.retry_delay
                );
            }
        }
        tokio::time::sleep(ctx.retry_delay).await;
    }
}

/// Range parameters every block-scoped request carries.
fn range_params(block: &Block) -> Vec<(String, String)> {
    let mut params = vec![
        ("startTimestamp".to_string(), block.start.to_string()),
        ("endTimestamp".to_string(), block.end.to_string()),
    ];
    if let Some(contract) = &block.contract {
        params.push(("contract".to_string(), contract.clone()));
    }
    params
}

/// The tail scans from its cursor to the far-future sentinel.
fn tail_params(from: Timestamp) -> Vec<(String, String)> {
    vec![
        ("startTimestamp".to_string(), from.to_string()),
        ("endTimestamp".to_string(), Timestamp::MAX.to_string()),
    ]
}
