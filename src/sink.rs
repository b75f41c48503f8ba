// src/sink.rs
//! The insertion sink — where harvested records land.
//!
//! The scheduler assumes nothing about storage beyond idempotence: replaying
//! a page of records any number of times must leave the store in the same
//! state as delivering it once. `MemoryStore` satisfies that by keying on
//! record identity.

use crate::error::Result;
use crate::types::{Dataset, Record};
use dashmap::DashMap;

/// The ability to durably upsert records, keyed by record identity.
#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    async fn upsert(&self, dataset: Dataset, records: &[Record]) -> Result<()>;
}

/// In-memory idempotent store backed by a concurrent map.
///
/// Suitable as the default sink for a single-process run and as the
/// reference implementation tests assert idempotence against.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<(Dataset, String), Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct records stored across all datasets.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up one record by identity.
    pub fn get(&self, dataset: Dataset, identity: &str) -> Option<Record> {
        self.records
            .get(&(dataset, identity.to_string()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait::async_trait]
impl RecordSink for MemoryStore {
    async fn upsert(&self, dataset: Dataset, records: &[Record]) -> Result<()> {
        for record in records {
            self.records
                .insert((dataset, record.identity()), record.clone());
        }
        Ok(())
    }
}
