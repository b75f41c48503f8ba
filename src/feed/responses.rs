// src/feed/responses.rs
//! Feed response envelope.
//!
//! The feed returns any HTTP status with either a success payload
//! (`{ [rootField]: Record[], continuation?: string }`) or an error payload
//! (`{ error: string, message: string }`). Both are *structurally valid*
//! responses here; success vs failure is an application-level classification
//! made by `FeedPage::is_success`, never by the transport layer.

use crate::error::FeedErrorCode;
use crate::types::{Dataset, Record};

/// One page of feed results, as obtained from a single HTTP exchange.
#[derive(Debug, Clone)]
pub struct FeedPage {
    /// HTTP status the feed answered with.
    pub status: u16,
    /// Records under the dataset's root field. Empty on error payloads.
    pub records: Vec<Record>,
    /// Opaque cursor for the next ascending page, when the feed has more.
    pub continuation: Option<String>,
    /// Error classification when the payload was not a success envelope.
    pub error: Option<FeedErrorCode>,
}

impl FeedPage {
    /// Interprets a raw status + body pair against a dataset's root field.
    ///
    /// A body that is not JSON, or JSON without the root field, is an
    /// application failure carrying the best error code we can extract —
    /// not a transport fault, so callers classify rather than retry blindly.
    pub fn from_response(status: u16, body: &str, dataset: Dataset) -> Self {
        let parsed: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => {
                return Self::failure(status, FeedErrorCode::from_http_status(status));
            }
        };

        match parsed.get(dataset.root_field()).and_then(|v| v.as_array()) {
            Some(items) => {
                let records = items.iter().cloned().map(Record::new).collect();
                let continuation = parsed
                    .get("continuation")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                FeedPage {
                    status,
                    records,
                    continuation,
                    error: None,
                }
            }
            None => {
                let code = parsed
                    .get("error")
                    .and_then(|v| v.as_str())
                    .map(FeedErrorCode::from_api_response)
                    .unwrap_or_else(|| FeedErrorCode::from_http_status(status));
                Self::failure(status, code)
            }
        }
    }

    /// An application-failure page.
    pub fn failure(status: u16, code: FeedErrorCode) -> Self {
        FeedPage {
            status,
            records: Vec::new(),
            continuation: None,
            error: Some(code),
        }
    }

    /// Application-level success classification: a 2xx status whose body
    /// carried the dataset's record array.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}
