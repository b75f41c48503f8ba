// src/feed/mod.rs
//! Feed interaction — the ability to fetch pages of records from the
//! external API.
//!
//! This module separates the I/O primitive from the scheduler: business
//! logic depends on the `FeedSource` trait, never on HTTP details.

pub mod client;
pub mod query;
pub mod responses;

use crate::error::Result;
use crate::types::Dataset;

// Re-export the public interface
pub use client::FeedHttpClient;
pub use query::{build_query, SortDirection};
pub use responses::FeedPage;

/// The ability to fetch one page of feed records.
///
/// This is the fundamental algebra for feed interaction. The production
/// implementation is `FeedHttpClient`; tests substitute scripted sources.
///
/// Implementations must only return `Err` for conditions the scheduler
/// cannot classify (the HTTP client never does — transport faults are
/// retried in place and application failures arrive as failed `FeedPage`s).
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_page(
        &self,
        dataset: Dataset,
        direction: SortDirection,
        params: &[(String, String)],
    ) -> Result<FeedPage>;
}
