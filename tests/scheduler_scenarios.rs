// tests/scheduler_scenarios.rs
//! End-to-end scheduler behavior over a scripted feed.
//!
//! The mock feed answers from a closure keyed on sort direction and query
//! parameters, and records every call, so tests can assert both what landed
//! in the sink and exactly which requests the scheduler issued.

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use syncnode::{
    run_tail, run_worker, AppError, Block, BlockQueue, Controller, Dataset, FeedErrorCode,
    FeedPage, FeedSource, MemoryStore, PoolSignal, Record, SortDirection, SyncConfig, Timestamp,
    WorkerContext, WorkerEvent, WorkerPool,
};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Scripted feed
// ---------------------------------------------------------------------------

type Call = (SortDirection, Vec<(String, String)>);
type Responder = dyn Fn(SortDirection, &[(String, String)]) -> FeedPage + Send + Sync;

struct ScriptedFeed {
    calls: Mutex<Vec<Call>>,
    respond: Box<Responder>,
}

impl ScriptedFeed {
    fn new(
        respond: impl Fn(SortDirection, &[(String, String)]) -> FeedPage + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch_page(
        &self,
        _dataset: Dataset,
        direction: SortDirection,
        params: &[(String, String)],
    ) -> Result<FeedPage, AppError> {
        self.calls.lock().push((direction, params.to_vec()));
        Ok((self.respond)(direction, params))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record(id: &str, updated_at: i64) -> Record {
    Record::new(json!({"id": id, "updatedAt": updated_at}))
}

fn page(records: Vec<Record>, continuation: Option<&str>) -> FeedPage {
    FeedPage {
        status: 200,
        records,
        continuation: continuation.map(str::to_string),
        error: None,
    }
}

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_millis(millis)
}

fn param(params: &[(String, String)], key: &str) -> Option<String> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

/// Spawns one worker over the given feed/sink and returns its wiring.
fn spawn_worker(
    feed: Arc<ScriptedFeed>,
    sink: Arc<MemoryStore>,
    retry_delay: Duration,
) -> (
    mpsc::Sender<Block>,
    mpsc::UnboundedReceiver<WorkerEvent>,
    tokio::task::JoinHandle<()>,
) {
    let (event_tx, events) = mpsc::unbounded_channel();
    let (assign_tx, assign_rx) = mpsc::channel(1);
    let ctx = WorkerContext {
        id: 0,
        feed,
        sink,
        events: event_tx,
        retry_delay,
    };
    let handle = tokio::spawn(run_worker(ctx, assign_rx));
    (assign_tx, events, handle)
}

/// Drains worker events until the release, counting splits along the way.
async fn collect_until_release(
    events: &mut mpsc::UnboundedReceiver<WorkerEvent>,
) -> (Vec<(Timestamp, Timestamp)>, Block) {
    let mut splits = Vec::new();
    loop {
        match events.recv().await.expect("worker events closed early") {
            WorkerEvent::Split { start, end, .. } => splits.push((start, end)),
            WorkerEvent::Released { block, .. } => return (splits, block),
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario A — low density passes straight through to processing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sparse_block_releases_with_zero_splits() {
    let feed = ScriptedFeed::new(|direction, _params| {
        let sparse = vec![
            record("a", 0),
            record("b", 2_000_000),
            record("c", 9_000_000),
        ];
        match direction {
            SortDirection::Ascending => page(sparse, None),
            SortDirection::Descending => {
                page(vec![record("c", 9_000_000), record("b", 2_000_000)], None)
            }
        }
    });
    let sink = Arc::new(MemoryStore::new());
    let (assign_tx, mut events, handle) =
        spawn_worker(Arc::clone(&feed), Arc::clone(&sink), Duration::from_millis(10));

    let block = Block::new(ts(0), ts(9_000_000), None, Dataset::Sales).unwrap();
    let block_id = block.id.clone();
    assign_tx.send(block).await.unwrap();

    let (splits, released) = collect_until_release(&mut events).await;
    assert_eq!(splits, vec![]);
    assert_eq!(released.id, block_id);
    assert_eq!(released.start, ts(0));
    assert_eq!(released.end, ts(9_000_000));
    assert_eq!(sink.len(), 3);

    drop(assign_tx);
    handle.await.unwrap();
}

#[tokio::test]
async fn empty_range_releases_without_processing() {
    let feed = ScriptedFeed::new(|_, _| page(vec![], None));
    let sink = Arc::new(MemoryStore::new());
    let (assign_tx, mut events, handle) =
        spawn_worker(Arc::clone(&feed), Arc::clone(&sink), Duration::from_millis(10));

    let block = Block::new(ts(0), ts(1000), None, Dataset::Sales).unwrap();
    assign_tx.send(block).await.unwrap();

    let (splits, _released) = collect_until_release(&mut events).await;
    assert_eq!(splits, vec![]);
    assert!(sink.is_empty());
    // Only the ascending bounding probe — no descending fetch, no pagination.
    assert_eq!(feed.calls().len(), 1);
    assert_eq!(feed.calls()[0].0, SortDirection::Ascending);

    drop(assign_tx);
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Scenario B — high density splits once at the midpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dense_block_splits_at_midpoint_and_keeps_lower_half() {
    let feed = ScriptedFeed::new(|direction, params| {
        let end = param(params, "endTimestamp").unwrap();
        match (direction, end.as_str()) {
            // Bounding pages over the full range: 42 records packed into
            // 10M ms — average spacing ~238k ms, below the threshold.
            (SortDirection::Ascending, "10000000") => {
                page(vec![record("a0", 0), record("a1", 2_000_000)], None)
            }
            (SortDirection::Descending, "10000000") => {
                let records = (0..40i64)
                    .map(|i| record(&format!("d{}", i), 10_000_000 - i * 2_500))
                    .collect();
                page(records, None)
            }
            // After the split the shrunk range probes sparse.
            (SortDirection::Descending, "5000000") => page(
                vec![record("s0", 4_900_000), record("s1", 4_800_000)],
                None,
            ),
            (SortDirection::Ascending, "5000000") => page(
                vec![
                    record("a0", 0),
                    record("a1", 2_000_000),
                    record("s1", 4_800_000),
                ],
                None,
            ),
            other => panic!("unexpected request: {:?}", other),
        }
    });
    let sink = Arc::new(MemoryStore::new());
    let (assign_tx, mut events, handle) =
        spawn_worker(Arc::clone(&feed), Arc::clone(&sink), Duration::from_millis(10));

    let block = Block::new(ts(0), ts(10_000_000), None, Dataset::Sales).unwrap();
    assign_tx.send(block).await.unwrap();

    let (splits, released) = collect_until_release(&mut events).await;
    // Exactly one split covering the upper half; the worker kept the lower.
    assert_eq!(splits, vec![(ts(5_000_000), ts(10_000_000))]);
    assert_eq!(released.start, ts(0));
    assert_eq!(released.end, ts(5_000_000));
    // Union of kept + split ranges equals the original coverage.
    assert_eq!(released.start, ts(0));
    assert_eq!(splits[0].1, ts(10_000_000));
    assert_eq!(released.end, splits[0].0);

    drop(assign_tx);
    handle.await.unwrap();
}

#[tokio::test]
async fn unsplittable_dense_range_force_releases() {
    // Two records one millisecond apart: always dense, but [5, 6] has no
    // interior midpoint to split at.
    let feed = ScriptedFeed::new(|_, _| {
        page(vec![record("a", 5), record("b", 6)], None)
    });
    let sink = Arc::new(MemoryStore::new());
    let (assign_tx, mut events, handle) =
        spawn_worker(Arc::clone(&feed), Arc::clone(&sink), Duration::from_millis(10));

    let block = Block::new(ts(5), ts(6), None, Dataset::Sales).unwrap();
    assign_tx.send(block).await.unwrap();

    let (splits, released) = collect_until_release(&mut events).await;
    // The granularity floor forces a release: no split, no pagination, and
    // no spinning on the dense range.
    assert_eq!(splits, vec![]);
    assert_eq!(released.start, ts(5));
    assert_eq!(released.end, ts(6));
    // One ascending and one descending bounding fetch — pagination would
    // have issued a third request.
    assert_eq!(feed.calls().len(), 2);
    // The graining sample itself still reached the sink.
    assert_eq!(sink.len(), 2);

    drop(assign_tx);
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Scenario C — application failures delay, retry identically, never skip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_pages_retry_after_fixed_delay_without_advancing_cursor() {
    let retry_delay = Duration::from_millis(40);
    let failures = Arc::new(AtomicUsize::new(0));
    let failures_in_mock = Arc::clone(&failures);

    let feed = ScriptedFeed::new(move |direction, params| match direction {
        SortDirection::Descending => page(vec![record("z", 2_000_000)], None),
        SortDirection::Ascending => match param(params, "continuation").as_deref() {
            None => page(
                vec![record("p1", 0), record("p2", 1_000_000)],
                Some("c1"),
            ),
            Some("c1") => {
                if failures_in_mock.fetch_add(1, Ordering::SeqCst) < 2 {
                    FeedPage::failure(500, FeedErrorCode::InternalError)
                } else {
                    page(vec![record("p3", 2_000_000)], None)
                }
            }
            Some(other) => panic!("unexpected continuation: {}", other),
        },
    });
    let sink = Arc::new(MemoryStore::new());
    let (assign_tx, mut events, handle) =
        spawn_worker(Arc::clone(&feed), Arc::clone(&sink), retry_delay);

    let block = Block::new(ts(0), ts(2_000_000), None, Dataset::Sales).unwrap();
    let started = Instant::now();
    assign_tx.send(block).await.unwrap();

    let (splits, _released) = collect_until_release(&mut events).await;
    let elapsed = started.elapsed();

    assert_eq!(splits, vec![]);
    // Two failures means exactly two fixed delays before the third attempt.
    assert!(
        elapsed >= retry_delay * 2,
        "expected at least two retry delays, elapsed {:?}",
        elapsed
    );
    // The same continuation was requested three times — the cursor never
    // advanced on failure.
    let c1_requests: Vec<Call> = feed
        .calls()
        .into_iter()
        .filter(|(_, params)| param(params, "continuation").as_deref() == Some("c1"))
        .collect();
    assert_eq!(c1_requests.len(), 3);
    // No duplicate inserts beyond the successful pages.
    assert_eq!(sink.len(), 4); // p1, p2, p3, z

    drop(assign_tx);
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Scenario D — tail burst delegates a split and advances its cursor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tail_burst_delegates_split_and_advances_past_it() {
    let base = Timestamp::now().as_millis();
    let first_ts = base - 5_000;
    let last_ts = base - 100;

    let feed = ScriptedFeed::new(move |direction, params| {
        let start: i64 = param(params, "startTimestamp").unwrap().parse().unwrap();
        match direction {
            SortDirection::Ascending => {
                if start == 1_000 {
                    // Burst tick: a full page with a continuation, densely
                    // packed just behind "now".
                    let records = (0..50i64)
                        .map(|i| record(&format!("t{}", i), first_ts + i * 100))
                        .collect();
                    page(records, Some("more"))
                } else {
                    // After delegation the tail starts past the burst.
                    page(vec![], None)
                }
            }
            SortDirection::Descending => {
                let records = (0..50i64)
                    .map(|i| record(&format!("n{}", i), base - i * 50))
                    .collect();
                page(records, None)
            }
        }
    });
    let sink = Arc::new(MemoryStore::new());
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let ctx = WorkerContext {
        id: 99,
        feed: Arc::clone(&feed) as Arc<dyn FeedSource>,
        sink: Arc::clone(&sink) as Arc<dyn syncnode::RecordSink>,
        events: event_tx,
        retry_delay: Duration::from_millis(10),
    };
    let tail = tokio::spawn(run_tail(
        ctx,
        Dataset::Sales,
        Duration::from_millis(20),
        ts(1_000),
    ));

    // Exactly one split covering the ascending page's own timestamp span.
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("tail never emitted a split")
        .unwrap();
    match event {
        WorkerEvent::Split { start, end, .. } => {
            assert_eq!(start, ts(first_ts));
            assert_eq!(end, ts(last_ts));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // The next tail tick must start from the delegated range's end.
    let deadline = Instant::now() + Duration::from_secs(2);
    let advanced = loop {
        let advanced = feed.calls().iter().any(|(direction, params)| {
            *direction == SortDirection::Ascending
                && param(params, "startTimestamp").as_deref() == Some(&last_ts.to_string())
        });
        if advanced || Instant::now() > deadline {
            break advanced;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert!(advanced, "tail did not advance past the delegated range");
    // The burst page itself was still upserted on the tailing path.
    assert!(sink.len() >= 50);

    tail.abort();
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bootstrap_builds_the_full_coverage_block() {
    let feed = ScriptedFeed::new(|direction, params| {
        assert!(params.is_empty(), "bootstrap probes must be unfiltered");
        match direction {
            SortDirection::Ascending => {
                page(vec![record("oldest", 100), record("x", 200)], Some("c"))
            }
            SortDirection::Descending => {
                page(vec![record("newest", 900), record("y", 800)], Some("c"))
            }
        }
    });
    let controller = Controller::new(SyncConfig::default(), feed, Arc::new(MemoryStore::new()));

    let block = controller.bootstrap_block().await.unwrap();
    assert_eq!(block.start, ts(100));
    assert_eq!(block.end, ts(900));
    assert_eq!(block.contract, None);
    assert_eq!(block.dataset, Dataset::Sales);
}

#[tokio::test]
async fn bootstrap_probe_failure_is_fatal() {
    let feed =
        ScriptedFeed::new(|_, _| FeedPage::failure(503, FeedErrorCode::ServiceUnavailable));
    let controller = Controller::new(SyncConfig::default(), feed, Arc::new(MemoryStore::new()));

    let err = controller.bootstrap_block().await.unwrap_err();
    assert!(matches!(err, AppError::BootstrapFailed(_)), "{}", err);
}

#[tokio::test]
async fn bootstrap_requires_usable_records() {
    let feed = ScriptedFeed::new(|_, _| page(vec![], None));
    let controller = Controller::new(SyncConfig::default(), feed, Arc::new(MemoryStore::new()));

    let err = controller.bootstrap_block().await.unwrap_err();
    assert!(matches!(err, AppError::BootstrapFailed(_)), "{}", err);
}

// ---------------------------------------------------------------------------
// Pool — exactly-once assignment across workers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pool_hands_each_block_to_exactly_one_worker() {
    let feed = ScriptedFeed::new(|direction, params| {
        let start = param(params, "startTimestamp").unwrap();
        match direction {
            SortDirection::Ascending => {
                page(vec![record(&format!("r{}", start), start.parse().unwrap())], None)
            }
            SortDirection::Descending => page(vec![], None),
        }
    });
    let sink = Arc::new(MemoryStore::new());
    let queue = Arc::new(BlockQueue::new());
    for i in 0..6i64 {
        queue.insert(Block::new(ts(i * 1_000_000), ts(i * 1_000_000 + 500_000), None, Dataset::Sales).unwrap());
    }

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let (split_tx, mut split_rx) = mpsc::unbounded_channel();
    let (pool, _event_tx) = WorkerPool::spawn(
        3,
        Arc::clone(&queue),
        feed.clone() as Arc<dyn FeedSource>,
        Arc::clone(&sink) as Arc<dyn syncnode::RecordSink>,
        Duration::from_millis(10),
        signal_rx,
        split_tx,
    );
    let pool_task = tokio::spawn(pool.run());
    signal_tx.send(PoolSignal::WorkAvailable).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while sink.len() < 6 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sink.len(), 6);
    assert!(queue.is_empty());
    assert!(split_rx.try_recv().is_err(), "no splits expected");

    // Each block was fetched by exactly one worker: one grain probe plus one
    // processing pass per range, never more.
    for i in 0..6i64 {
        let start = (i * 1_000_000).to_string();
        let ascending_for_range = feed
            .calls()
            .iter()
            .filter(|(direction, params)| {
                *direction == SortDirection::Ascending
                    && param(params, "startTimestamp").as_deref() == Some(&start)
            })
            .count();
        assert_eq!(ascending_for_range, 2, "range starting at {}", start);
    }

    drop(signal_tx);
    pool_task.abort();
}

// ---------------------------------------------------------------------------
// Full stack — bootstrap through release via Controller::run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn controller_run_backfills_the_feed_into_the_sink() {
    let feed = ScriptedFeed::new(|direction, params| {
        if params.is_empty() {
            // Bootstrap probes.
            return match direction {
                SortDirection::Ascending => page(vec![record("oldest", 100)], None),
                SortDirection::Descending => page(vec![record("newest", 9_000_000)], None),
            };
        }
        let end = param(params, "endTimestamp").unwrap();
        if end == i64::MAX.to_string() {
            // Tail is caught up from the start.
            return page(vec![], None);
        }
        match direction {
            SortDirection::Ascending => page(
                vec![
                    record("oldest", 100),
                    record("mid", 4_000_000),
                    record("newest", 9_000_000),
                ],
                None,
            ),
            SortDirection::Descending => page(vec![record("newest", 9_000_000)], None),
        }
    });
    let sink = Arc::new(MemoryStore::new());
    let config = SyncConfig {
        workers: 2,
        retry_delay: Duration::from_millis(20),
        tail_interval: Duration::from_millis(20),
        ..SyncConfig::default()
    };
    let controller = Controller::new(
        config,
        feed.clone() as Arc<dyn FeedSource>,
        Arc::clone(&sink) as Arc<dyn syncnode::RecordSink>,
    );
    let run = tokio::spawn(controller.run());

    let deadline = Instant::now() + Duration::from_secs(2);
    while sink.len() < 3 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sink.len(), 3);

    run.abort();
}
