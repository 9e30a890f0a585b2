use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use newsline_common::types::{EnrichedPost, SourceCursor};
use newsline_store::{NewsStore, WriteReport};

// --- FeedFetcher trait ---

/// Fetches one rendered feed page. Injected into the scraper so parsing
/// can be tested against fixture HTML.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTP fetcher. The feed pages are server-rendered, no browser
/// needed.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(concat!("newsline/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        info!(url, "Fetching feed page");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Feed request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("Feed returned an error status: {url}"))?;
        let html = resp
            .text()
            .await
            .with_context(|| format!("Failed to read feed body: {url}"))?;
        info!(url, bytes = html.len(), "Feed page fetched");
        Ok(html)
    }
}

// --- CollectorStore trait ---

/// Storage seam the pipeline runs against: cursor recomputation before a
/// run, one batch write after it.
#[async_trait]
pub trait CollectorStore: Send + Sync {
    async fn source_cursors(&self) -> Result<Vec<SourceCursor>>;
    async fn insert_batch(
        &self,
        items_by_source: &HashMap<String, Vec<EnrichedPost>>,
    ) -> Result<WriteReport>;
}

#[async_trait]
impl CollectorStore for NewsStore {
    async fn source_cursors(&self) -> Result<Vec<SourceCursor>> {
        NewsStore::source_cursors(self).await
    }

    async fn insert_batch(
        &self,
        items_by_source: &HashMap<String, Vec<EnrichedPost>>,
    ) -> Result<WriteReport> {
        NewsStore::insert_batch(self, items_by_source).await
    }
}
