// src/constants.rs
//! Domain constants that define the operational boundaries of the system.
//!
//! Each constant is named for the domain concept it constrains, not its
//! technical role. Reading these constants should tell you the story of how
//! the harvester operates: how much it asks for per request, when a time
//! range counts as too dense, and how it paces its retries.

// ---------------------------------------------------------------------------
// Feed API boundaries
// ---------------------------------------------------------------------------

/// How many records the feed returns per page of results.
///
/// The feed's hard cap is 1000. We always request the maximum to minimize
/// round-trips while backfilling.
pub const FEED_PAGE_SIZE: u32 = 1000;

// ---------------------------------------------------------------------------
// Partitioning boundaries
// ---------------------------------------------------------------------------

/// Maximum tolerable average spacing, in milliseconds, between records in a
/// density probe before the range must be subdivided.
///
/// A combined ascending+descending sample whose records sit closer together
/// than one per five minutes signals a range too dense to page through
/// safely within the feed's cursor semantics.
pub const DENSITY_THRESHOLD_MILLIS: i64 = 300_000;

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

/// Delay before retrying a request that obtained a status but was classified
/// as an application-level failure. Fixed, never grows: liveness over latency.
pub const RETRY_DELAY_MILLIS: u64 = 5_000;

/// Pause between iterations of the tail loop.
pub const TAIL_INTERVAL_MILLIS: u64 = 5_000;
