// src/feed/query.rs
//! Query normalization for feed requests.
//!
//! Every request carries the same fixed preamble — the page-size cap and the
//! metadata-inclusion flag — followed by the sort direction under whichever
//! key the dataset expects, then the caller's parameters verbatim. Output is
//! a plain key=value query string; the feed does no escaping and neither do
//! we.

use crate::constants::FEED_PAGE_SIZE;
use crate::types::Dataset;

/// Sort direction of a page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// Builds the normalized query string for one feed request.
pub fn build_query(
    dataset: Dataset,
    direction: SortDirection,
    params: &[(String, String)],
) -> String {
    let mut pairs: Vec<String> = vec![
        format!("limit={}", FEED_PAGE_SIZE),
        "includeCriteriaMetadata=true".to_string(),
        format!("{}={}", dataset.sort_key(), direction.as_str()),
    ];
    pairs.extend(params.iter().map(|(k, v)| format!("{}={}", k, v)));
    pairs.join("&")
}
