// src/types.rs
//! Domain types for the harvester.
//!
//! Strong newtypes keep the scheduler honest: a `Timestamp` is always epoch
//! milliseconds, a `BlockId` is always a fresh UUID, and dataset/chain
//! dispatch lives on the enums rather than in scattered match arms.

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// A point in time as milliseconds since the Unix epoch.
///
/// This is the feed's wire form for `startTimestamp`/`endTimestamp` and the
/// resolution at which ranges can be subdivided.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Far-future sentinel used as the open upper bound of the tail scan.
    /// Never interpreted as a calendar date.
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    pub const fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Timestamp(Utc::now().timestamp_millis())
    }

    /// Parses a feed date representation into the request's timestamp form.
    ///
    /// Accepts epoch milliseconds as a JSON number (fractional values
    /// truncate toward zero) and RFC 3339 strings.
    pub fn parse(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(millis) = n.as_i64() {
                    Ok(Timestamp(millis))
                } else if let Some(millis) = n.as_f64() {
                    Ok(Timestamp(millis as i64))
                } else {
                    Err(AppError::InvalidTimestamp(n.to_string()))
                }
            }
            serde_json::Value::String(s) => {
                let parsed: DateTime<Utc> = s
                    .parse()
                    .map_err(|_| AppError::InvalidTimestamp(s.clone()))?;
                Ok(Timestamp(parsed.timestamp_millis()))
            }
            other => Err(AppError::InvalidTimestamp(other.to_string())),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Block identity
// ---------------------------------------------------------------------------

/// Unique identifier of one unit of ingestion work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Mints a fresh random identifier.
    pub fn new() -> Self {
        BlockId(Uuid::new_v4().as_simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// API key
// ---------------------------------------------------------------------------

/// A validated feed API key. Display is redacted so keys never leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation("API key must not be empty".into()));
        }
        Ok(ApiKey(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(***)")
    }
}

// ---------------------------------------------------------------------------
// Chain → base URL mapping
// ---------------------------------------------------------------------------

/// Chains whose feed deployments this harvester knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Chain {
    Mainnet,
    Polygon,
    Optimism,
    Arbitrum,
    Base,
}

impl Chain {
    /// Base URL of the feed deployment serving this chain.
    pub fn base_url(&self) -> &'static str {
        match self {
            Chain::Mainnet => "https://api.syncfeed.io",
            Chain::Polygon => "https://api-polygon.syncfeed.io",
            Chain::Optimism => "https://api-optimism.syncfeed.io",
            Chain::Arbitrum => "https://api-arbitrum.syncfeed.io",
            Chain::Base => "https://api-base.syncfeed.io",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Chain::Mainnet => "mainnet",
            Chain::Polygon => "polygon",
            Chain::Optimism => "optimism",
            Chain::Arbitrum => "arbitrum",
            Chain::Base => "base",
        };
        write!(f, "{}", name)
    }
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// The record feeds this harvester can ingest.
///
/// Each dataset maps to the response field holding its record array, the
/// request path serving it, and the query key its sort direction travels
/// under (the feed is inconsistent about `orderBy` vs `sortBy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Dataset {
    Sales,
    Orders,
}

impl Dataset {
    /// Response field holding this dataset's record array.
    pub fn root_field(&self) -> &'static str {
        match self {
            Dataset::Sales => "sales",
            Dataset::Orders => "orders",
        }
    }

    /// Request path serving this dataset.
    pub fn path(&self) -> &'static str {
        match self {
            Dataset::Sales => "/sales/v1",
            Dataset::Orders => "/orders/v1",
        }
    }

    /// Query key carrying the sort direction for this dataset.
    pub fn sort_key(&self) -> &'static str {
        match self {
            Dataset::Sales => "orderBy",
            Dataset::Orders => "sortBy",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root_field())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One externally-defined feed record.
///
/// Records are opaque JSON payloads; the harvester only ever reads their
/// identity and `updatedAt` timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(serde_json::Value);

impl Record {
    pub fn new(value: serde_json::Value) -> Self {
        Record(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// The record's `updatedAt` timestamp, if present and parseable.
    pub fn updated_at(&self) -> Option<Timestamp> {
        self.0
            .get("updatedAt")
            .and_then(|v| Timestamp::parse(v).ok())
    }

    /// Identity key for idempotent upserts. Falls back to the full payload
    /// when the feed omits an `id`, so replays still converge.
    pub fn identity(&self) -> String {
        match self.0.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self.0.to_string(),
        }
    }
}
