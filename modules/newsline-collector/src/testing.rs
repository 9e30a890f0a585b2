//! Mocks and fixtures shared by the collector's unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use inference_client::InferenceService;
use newsline_common::types::{
    Category, EnrichedPost, RawPost, Source, SourceCursor, EMBEDDING_DIM,
};
use newsline_store::WriteReport;

use crate::traits::{CollectorStore, FeedFetcher};

// --- feed fixtures ---

pub struct FixturePost {
    pub handle: String,
    pub external_id: i64,
    pub datetime: String,
    /// Inner HTML of the text block. Empty means the post has no text
    /// block at all, like a pure media post.
    pub body_html: String,
}

/// Render fixture posts into a feed page shaped like the real markup.
pub fn feed_html(posts: &[FixturePost]) -> String {
    let mut out = String::from("<html><body><section class=\"tgme_channel_history\">\n");
    for p in posts {
        out.push_str("<div class=\"tgme_widget_message_bubble\">\n");
        if !p.body_html.is_empty() {
            out.push_str(&format!(
                "  <div class=\"tgme_widget_message_text\">{}</div>\n",
                p.body_html
            ));
        }
        out.push_str(&format!(
            "  <a class=\"tgme_widget_message_date\" href=\"https://t.me/{}/{}\">\
<time class=\"time\" datetime=\"{}\">12:30</time></a>\n",
            p.handle, p.external_id, p.datetime
        ));
        out.push_str("</div>\n");
    }
    out.push_str("</section></body></html>\n");
    out
}

pub fn raw_post(source: &str, id: i64) -> RawPost {
    let url = format!("https://t.me/{source}/{id}");
    RawPost {
        source: source.to_string(),
        external_id: id,
        url: url.clone(),
        published_at: NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
        body: format!("story {id}"),
        links: vec![url],
    }
}

// --- FeedFetcher mock ---

/// Serves canned pages by URL; anything unregistered fails the fetch.
pub struct MockFetcher {
    pages: HashMap<String, String>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    pub fn on_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl FeedFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        match self.pages.get(url) {
            Some(html) => Ok(html.clone()),
            None => bail!("no page registered for {url}"),
        }
    }
}

// --- InferenceService mock ---

/// Deterministic inference stub. Every batch result is derived from the
/// input index, so tests can check positional merging directly.
pub struct MockInference {
    failing: Option<&'static str>,
    truncate_summaries: bool,
    labels: Option<Vec<String>>,
}

impl MockInference {
    pub fn new() -> Self {
        Self {
            failing: None,
            truncate_summaries: false,
            labels: None,
        }
    }

    /// Make one capability fail: "clean", "embed", "classify",
    /// "summarize" or "headline".
    pub fn failing(mut self, capability: &'static str) -> Self {
        self.failing = Some(capability);
        self
    }

    /// Return one summary fewer than requested.
    pub fn truncating_summaries(mut self) -> Self {
        self.truncate_summaries = true;
        self
    }

    /// Override the classifier output with fixed labels.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }

    fn fail_if(&self, capability: &str) -> Result<()> {
        if self.failing == Some(capability) {
            bail!("{capability} capability is down");
        }
        Ok(())
    }
}

#[async_trait]
impl InferenceService for MockInference {
    async fn clean_text(&self, text: &str, _source: &str) -> Result<String> {
        self.fail_if("clean")?;
        Ok(format!("clean:{text}"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.fail_if("embed")?;
        Ok((0..texts.len())
            .map(|i| {
                let mut v = vec![0.0_f32; EMBEDDING_DIM];
                v[0] = i as f32;
                v
            })
            .collect())
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<String>> {
        self.fail_if("classify")?;
        if let Some(labels) = &self.labels {
            return Ok(labels.clone());
        }
        Ok((0..texts.len())
            .map(|i| Category::ALL[i % Category::ALL.len()].as_str().to_string())
            .collect())
    }

    async fn summarize_batch(&self, texts: &[String]) -> Result<Vec<String>> {
        self.fail_if("summarize")?;
        let mut out: Vec<String> = (0..texts.len()).map(|i| format!("summary {i}")).collect();
        if self.truncate_summaries {
            out.pop();
        }
        Ok(out)
    }

    async fn headline_batch(&self, texts: &[String]) -> Result<Vec<String>> {
        self.fail_if("headline")?;
        Ok((0..texts.len()).map(|i| format!("headline {i}")).collect())
    }
}

// --- CollectorStore mock ---

/// In-memory store recording every write the pipeline makes.
pub struct MockStore {
    cursors: Vec<SourceCursor>,
    written: Mutex<HashMap<String, Vec<EnrichedPost>>>,
    write_calls: Mutex<usize>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            cursors: Vec::new(),
            written: Mutex::new(HashMap::new()),
            write_calls: Mutex::new(0),
        }
    }

    pub fn with_source(mut self, handle: &str, last_external_id: i64) -> Self {
        self.cursors.push(SourceCursor {
            source: Source {
                handle: handle.to_string(),
                title: handle.to_string(),
                media_type: "news".to_string(),
                strip_repost_prefix: false,
            },
            last_external_id,
        });
        self
    }

    pub fn written(&self) -> HashMap<String, Vec<EnrichedPost>> {
        self.written.lock().unwrap().clone()
    }

    pub fn write_calls(&self) -> usize {
        *self.write_calls.lock().unwrap()
    }
}

#[async_trait]
impl CollectorStore for MockStore {
    async fn source_cursors(&self) -> Result<Vec<SourceCursor>> {
        Ok(self.cursors.clone())
    }

    async fn insert_batch(
        &self,
        items_by_source: &HashMap<String, Vec<EnrichedPost>>,
    ) -> Result<WriteReport> {
        *self.write_calls.lock().unwrap() += 1;
        let mut written = self.written.lock().unwrap();
        let mut total = 0;
        for (source, items) in items_by_source {
            total += items.len();
            written
                .entry(source.clone())
                .or_default()
                .extend(items.iter().cloned());
        }
        Ok(WriteReport {
            total,
            succeeded: total,
            failed: 0,
        })
    }
}
