// src/feed/client.rs
//! HTTP request primitive for the feed.
//!
//! A thin wrapper around reqwest. The client owns the fixed header set and
//! the transport-fault policy: a request that never obtains an HTTP status
//! (connection refused, timeout, body cut off) is retried immediately and
//! without limit, because the scheduler above has nothing useful to do with
//! a half-request. Any obtained status is returned as a structurally valid
//! `FeedPage`; classifying it as success or failure is the caller's job.

use super::query::{build_query, SortDirection};
use super::responses::FeedPage;
use super::FeedSource;
use crate::error::{AppError, Result};
use crate::types::{ApiKey, Dataset};
use reqwest::{header, Client};

/// A thin wrapper around a reqwest Client for feed requests.
#[derive(Clone)]
pub struct FeedHttpClient {
    client: Client,
    base_url: String,
}

impl FeedHttpClient {
    /// Creates a new HTTP client bound to one feed deployment.
    pub fn new(base_url: impl Into<String>, api_key: &ApiKey) -> Result<Self> {
        let client = Client::builder()
            .default_headers(Self::create_headers(api_key)?)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Creates the fixed headers every feed request carries.
    fn create_headers(api_key: &ApiKey) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();

        headers.insert(
            "X-API-KEY",
            header::HeaderValue::from_str(api_key.as_str()).map_err(|e| {
                AppError::MissingConfiguration(format!("Invalid API key format: {}", e))
            })?,
        );
        headers.insert("X-SYSTEM-TYPE", header::HeaderValue::from_static("sync-node"));
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        Ok(headers)
    }

    /// Issues one GET and waits for a status + body, retrying transport
    /// faults in place.
    async fn get_with_transport_retry(&self, url: &str) -> (u16, String) {
        loop {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    match response.text().await {
                        Ok(body) => return (status, body),
                        Err(e) => {
                            // Body cut off after the status arrived — still a
                            // transport fault; the page is not usable.
                            log::warn!("Response body read failed for {}: {}", url, e);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Transport fault for {}: {}", url, e);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl FeedSource for FeedHttpClient {
    async fn fetch_page(
        &self,
        dataset: Dataset,
        direction: SortDirection,
        params: &[(String, String)],
    ) -> Result<FeedPage> {
        let query = build_query(dataset, direction, params);
        let url = format!("{}{}?{}", self.base_url, dataset.path(), query);
        log::debug!("GET {}", url);

        let (status, body) = self.get_with_transport_retry(&url).await;
        let page = FeedPage::from_response(status, &body, dataset);

        if let Some(code) = &page.error {
            log::debug!(
                "Feed answered {} with {} ({})",
                status,
                code,
                if code.is_retryable() {
                    "transient"
                } else {
                    "persistent"
                }
            );
        }

        Ok(page)
    }
}
