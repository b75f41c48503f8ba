// src/scheduler/block.rs
//! Blocks — the unit of ingestion work — and the pure predicates that drive
//! their subdivision.

use crate::error::{AppError, Result};
use crate::types::{BlockId, Dataset, Record, Timestamp};

/// One unit of ingestion work: a time range over one dataset, optionally
/// scoped to a contract filter.
///
/// Invariant: `start <= end`. A block is exclusively owned by at most one
/// worker at any instant; ownership transfers only through the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub start: Timestamp,
    pub end: Timestamp,
    pub contract: Option<String>,
    pub dataset: Dataset,
}

impl Block {
    /// Creates a block, enforcing the range invariant.
    pub fn new(
        start: Timestamp,
        end: Timestamp,
        contract: Option<String>,
        dataset: Dataset,
    ) -> Result<Self> {
        if start > end {
            return Err(AppError::Validation(format!(
                "block range inverted: start {} > end {}",
                start, end
            )));
        }
        Ok(Block {
            id: BlockId::new(),
            start,
            end,
            contract,
            dataset,
        })
    }

    /// Width of the covered range in milliseconds.
    pub fn span_millis(&self) -> i64 {
        self.end.as_millis() - self.start.as_millis()
    }
}

/// Returns the timestamp midway between `start` and `end` at millisecond
/// resolution.
///
/// When no interior point exists (adjacent or equal millis), one of the
/// boundaries comes back — the signal that the range cannot be subdivided
/// further.
pub fn middle_timestamp(start: Timestamp, end: Timestamp) -> Timestamp {
    let half_span = (end.as_millis() - start.as_millis()) / 2;
    Timestamp::from_millis(start.as_millis() + half_span)
}

/// Decides whether a sampled range holds too many records to safely page
/// through before its cursor semantics break down.
///
/// The sample is dense when the average spacing between its records —
/// the distance between the oldest and newest `updatedAt` divided by the
/// record count — falls below `threshold_millis`. More records in a fixed
/// span push the quotient down (more likely dense); a wider span for a
/// fixed count pushes it up. A zero-width sample with more than one record
/// is always dense. Records without a parseable `updatedAt` are ignored.
pub fn is_high_density(records: &[Record], threshold_millis: i64) -> bool {
    let mut oldest: Option<Timestamp> = None;
    let mut newest: Option<Timestamp> = None;
    let mut count: i64 = 0;

    for record in records {
        let Some(ts) = record.updated_at() else {
            continue;
        };
        count += 1;
        oldest = Some(oldest.map_or(ts, |o| o.min(ts)));
        newest = Some(newest.map_or(ts, |n| n.max(ts)));
    }

    let (Some(oldest), Some(newest)) = (oldest, newest) else {
        return false;
    };
    if count < 2 {
        return false;
    }

    let span = newest.as_millis() - oldest.as_millis();
    if span == 0 {
        return true;
    }
    span / count < threshold_millis
}
