//! Feed page scraping: fetch one rendered channel feed, parse its post
//! blocks, and produce raw unenriched posts past the source's cursor.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use scraper::{Html, Selector};
use tracing::{debug, info};

use inference_client::InferenceService;
use newsline_common::types::{external_id_from_url, RawPost, Source};

use crate::links::canonicalize_link;
use crate::traits::FeedFetcher;

/// A post block parsed out of the feed HTML, before body cleaning.
struct ParsedPost {
    url: String,
    external_id: i64,
    published_at: NaiveDateTime,
    body: String,
    links: Vec<String>,
}

pub struct FeedScraper {
    fetcher: Arc<dyn FeedFetcher>,
    inference: Arc<dyn InferenceService>,
    feed_base_url: String,
}

impl FeedScraper {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        inference: Arc<dyn InferenceService>,
        feed_base_url: &str,
    ) -> Self {
        Self {
            fetcher,
            inference,
            feed_base_url: feed_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Collect every post newer than `last_external_id` from one source.
    ///
    /// Re-fetches the feed page on every invocation. Any fetch or
    /// page-level parse fault aborts the whole source for this run; the
    /// cursor is not advanced, so the next run retries naturally.
    pub async fn collect(&self, source: &Source, last_external_id: i64) -> Result<Vec<RawPost>> {
        let feed_url = format!("{}/{}", self.feed_base_url, source.handle);
        let html = self.fetcher.fetch(&feed_url).await?;

        let parsed = parse_feed(&html, last_external_id)
            .with_context(|| format!("Failed to parse feed page for {}", source.handle))?;

        let mut posts = Vec::with_capacity(parsed.len());
        for p in parsed {
            let body = if source.strip_repost_prefix {
                strip_repost_label(&p.body)
            } else {
                p.body
            };
            let body = self.inference.clean_text(&body, &source.handle).await?;
            posts.push(RawPost {
                source: source.handle.clone(),
                external_id: p.external_id,
                url: p.url,
                published_at: p.published_at,
                body,
                links: p.links,
            });
        }

        info!(
            source = %source.handle,
            last_external_id,
            count = posts.len(),
            "Feed collected"
        );
        Ok(posts)
    }
}

/// Parse the feed page into post blocks newer than `last_external_id`.
///
/// Synchronous on purpose: the parsed DOM is not `Send`, so it must be
/// dropped before any await point.
fn parse_feed(html: &str, last_external_id: i64) -> Result<Vec<ParsedPost>> {
    let block_sel = Selector::parse(".tgme_widget_message_bubble").expect("valid selector");
    let date_sel = Selector::parse("a.tgme_widget_message_date").expect("valid selector");
    let time_sel = Selector::parse("time.time").expect("valid selector");
    let body_sel = Selector::parse(".tgme_widget_message_text").expect("valid selector");
    let anchor_sel = Selector::parse("a").expect("valid selector");

    let document = Html::parse_document(html);
    let mut posts = Vec::new();

    for block in document.select(&block_sel) {
        let date_el = block
            .select(&date_sel)
            .next()
            .context("Post block has no date anchor")?;
        let url = date_el
            .value()
            .attr("href")
            .context("Post date anchor has no href")?
            .to_string();
        let external_id = external_id_from_url(&url)
            .with_context(|| format!("Post URL has no numeric suffix: {url}"))?;

        if external_id <= last_external_id {
            continue;
        }

        let datetime = block
            .select(&time_sel)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .with_context(|| format!("Post has no publish timestamp: {url}"))?;
        // Timezone is dropped without conversion; stored timestamps are
        // the feed's wall-clock values.
        let published_at = DateTime::parse_from_rfc3339(datetime)
            .with_context(|| format!("Unparsable publish timestamp for {url}: {datetime}"))?
            .naive_local();

        // Posts without a text block (pure media, service messages) are
        // not an error, they just aren't news.
        let body_el = match block.select(&body_sel).next() {
            Some(el) => el,
            None => {
                debug!(url, "Skipping post without a body");
                continue;
            }
        };
        let body: String = body_el.text().collect();

        let mut seen = HashSet::new();
        let mut links: Vec<String> = body_el
            .select(&anchor_sel)
            .map(|a| canonicalize_link(a.value().attr("href"), &url))
            .filter(|l| seen.insert(l.clone()))
            .collect();
        if links.is_empty() {
            links.push(canonicalize_link(None, &url));
        }

        posts.push(ParsedPost {
            url,
            external_id,
            published_at,
            body,
            links,
        });
    }

    Ok(posts)
}

/// Aggregator channels prefix posts with a "reposted from" label ending
/// in ": " and often tag a trailing topic hash. Keep only the segment
/// after the last label and before the first tag.
fn strip_repost_label(body: &str) -> String {
    let after_label = body
        .rsplit_once(": ")
        .map(|(_, rest)| rest)
        .unwrap_or(body);
    after_label
        .split('#')
        .next()
        .unwrap_or(after_label)
        .to_string()
}
