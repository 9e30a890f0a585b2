//! One end-to-end collection cycle: cursor lookup, scrape, enrich,
//! persist, with run-level accounting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use newsline_common::types::{EnrichedPost, SourceCursor};
use newsline_common::NewslineError;

use crate::enrich::Enricher;
use crate::scraper::FeedScraper;
use crate::traits::CollectorStore;

/// Outcome of one collection run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// Items handed to the writer (0 when no source yielded anything).
    pub total_items: usize,
    /// Sources that failed to scrape or enrich this cycle. Their cursors
    /// did not advance, so the next run picks their posts up again.
    pub sources_failed: usize,
    pub elapsed: Duration,
}

pub struct Pipeline {
    store: Arc<dyn CollectorStore>,
    scraper: FeedScraper,
    enricher: Enricher,
    /// Scheduled cycles may overrun the interval; the lock turns an
    /// overlapping invocation into an explicit error instead of a race
    /// over the same sources.
    run_lock: tokio::sync::Mutex<()>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn CollectorStore>, scraper: FeedScraper, enricher: Enricher) -> Self {
        Self {
            store,
            scraper,
            enricher,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one collection cycle across all enabled sources.
    ///
    /// Sources are processed strictly sequentially. A failing source is
    /// logged and skipped; a source with no new posts is skipped without
    /// an enrichment or write call. The writer runs once at the end with
    /// everything that survived.
    pub async fn run_once(&self) -> Result<RunSummary, NewslineError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| NewslineError::RunInProgress)?;

        let started = Instant::now();
        let cursors = self.store.source_cursors().await?;
        info!(sources = cursors.len(), "Collection run starting");

        let mut batches: HashMap<String, Vec<EnrichedPost>> = HashMap::new();
        let mut sources_failed = 0usize;

        for cursor in &cursors {
            let handle = cursor.source.handle.as_str();
            match self.collect_source(cursor).await {
                Ok(items) if items.is_empty() => {
                    info!(source = handle, "No new posts");
                }
                Ok(items) => {
                    info!(source = handle, count = items.len(), "Source collected");
                    batches.insert(handle.to_string(), items);
                }
                Err(e) => {
                    sources_failed += 1;
                    warn!(
                        source = handle,
                        error = %e,
                        "Source failed this cycle; cursor not advanced, next run retries"
                    );
                }
            }
        }

        if batches.is_empty() {
            warn!(sources_failed, "Run produced no new posts, nothing to write");
            return Ok(RunSummary {
                total_items: 0,
                sources_failed,
                elapsed: started.elapsed(),
            });
        }

        let report = self.store.insert_batch(&batches).await?;
        let elapsed = started.elapsed();
        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            sources_failed,
            elapsed_secs = elapsed.as_secs_f64().round(),
            "Collection run complete"
        );

        Ok(RunSummary {
            total_items: report.total,
            sources_failed,
            elapsed,
        })
    }

    /// Scrape and enrich one source. No new posts → no enrichment call.
    async fn collect_source(&self, cursor: &SourceCursor) -> anyhow::Result<Vec<EnrichedPost>> {
        let raw = self
            .scraper
            .collect(&cursor.source, cursor.last_external_id)
            .await?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        self.enricher.enrich(&cursor.source.handle, raw).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{feed_html, FixturePost, MockFetcher, MockInference, MockStore};

    fn fixture(handle: &str, ids: &[i64]) -> String {
        let posts: Vec<FixturePost> = ids
            .iter()
            .map(|&id| FixturePost {
                handle: handle.to_string(),
                external_id: id,
                datetime: "2023-05-01T12:30:00+00:00".to_string(),
                body_html: format!("story {id}"),
            })
            .collect();
        feed_html(&posts)
    }

    fn pipeline(store: Arc<MockStore>, fetcher: MockFetcher) -> Pipeline {
        let inference = Arc::new(MockInference::new());
        let scraper = FeedScraper::new(Arc::new(fetcher), inference.clone(), "https://feeds.test");
        Pipeline::new(store, scraper, Enricher::new(inference))
    }

    #[tokio::test]
    async fn collects_enriches_and_writes_once() {
        let store = Arc::new(MockStore::new().with_source("wire", 100));
        let fetcher =
            MockFetcher::new().on_page("https://feeds.test/wire", &fixture("wire", &[101, 102]));
        let pipeline = pipeline(store.clone(), fetcher);

        let summary = pipeline.run_once().await.unwrap();
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.sources_failed, 0);
        assert_eq!(store.write_calls(), 1);

        let written = store.written();
        assert_eq!(written["wire"].len(), 2);
        assert_eq!(written["wire"][0].external_id, 101);
    }

    #[tokio::test]
    async fn source_with_no_new_posts_is_skipped_entirely() {
        let store = Arc::new(MockStore::new().with_source("wire", 200));
        // The feed only contains posts at or below the cursor.
        let fetcher =
            MockFetcher::new().on_page("https://feeds.test/wire", &fixture("wire", &[199, 200]));
        let pipeline = pipeline(store.clone(), fetcher);

        let summary = pipeline.run_once().await.unwrap();
        assert_eq!(summary.total_items, 0);
        // Writer is not invoked when the whole run is empty.
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn failing_source_does_not_abort_the_run() {
        let store = Arc::new(
            MockStore::new()
                .with_source("broken", 0)
                .with_source("wire", 100),
        );
        // "broken" has no registered page, so its fetch fails; "wire"
        // still collects.
        let fetcher =
            MockFetcher::new().on_page("https://feeds.test/wire", &fixture("wire", &[101]));
        let pipeline = pipeline(store.clone(), fetcher);

        let summary = pipeline.run_once().await.unwrap();
        assert_eq!(summary.sources_failed, 1);
        assert_eq!(summary.total_items, 1);
        let written = store.written();
        assert!(written.contains_key("wire"));
        assert!(!written.contains_key("broken"));
    }

    #[tokio::test]
    async fn enrichment_failure_abandons_that_sources_batch() {
        let store = Arc::new(MockStore::new().with_source("wire", 100));
        let fetcher =
            MockFetcher::new().on_page("https://feeds.test/wire", &fixture("wire", &[101]));
        let inference = Arc::new(MockInference::new().failing("embed"));
        let scraper = FeedScraper::new(
            Arc::new(fetcher),
            Arc::new(MockInference::new()),
            "https://feeds.test",
        );
        let pipeline = Pipeline::new(store.clone(), scraper, Enricher::new(inference));

        let summary = pipeline.run_once().await.unwrap();
        assert_eq!(summary.sources_failed, 1);
        assert_eq!(summary.total_items, 0);
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn overlapping_run_is_rejected() {
        let store = Arc::new(MockStore::new());
        let pipeline = pipeline(store, MockFetcher::new());

        let _held = pipeline.run_lock.lock().await;
        let err = pipeline.run_once().await.unwrap_err();
        assert!(matches!(err, NewslineError::RunInProgress));
    }
}
