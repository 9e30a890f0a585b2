use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Dimension of the embedding vectors produced by the inference service.
pub const EMBEDDING_DIM: usize = 768;

/// Closed set of category labels the classifier can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Climate,
    Conflicts,
    Culture,
    Economy,
    Gloss,
    Health,
    Politics,
    Science,
    Society,
    Sports,
    Travel,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Climate,
        Category::Conflicts,
        Category::Culture,
        Category::Economy,
        Category::Gloss,
        Category::Health,
        Category::Politics,
        Category::Science,
        Category::Society,
        Category::Sports,
        Category::Travel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Climate => "climate",
            Category::Conflicts => "conflicts",
            Category::Culture => "culture",
            Category::Economy => "economy",
            Category::Gloss => "gloss",
            Category::Health => "health",
            Category::Politics => "politics",
            Category::Science => "science",
            Category::Society => "society",
            Category::Sports => "sports",
            Category::Travel => "travel",
        }
    }

    /// Parse a classifier label. Returns `None` for anything outside the
    /// closed set — the orchestrator treats that as a batch failure.
    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.as_str() == label)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An originating feed/channel that posts are collected from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub handle: String,
    pub title: String,
    pub media_type: String,
    /// Aggregator channels prefix each post with a "reposted from" label
    /// that must be trimmed before enrichment.
    pub strip_repost_prefix: bool,
}

/// Per-source collection marker, recomputed from storage every run.
/// `last_external_id == 0` means the source has never been collected.
#[derive(Debug, Clone)]
pub struct SourceCursor {
    pub source: Source,
    pub last_external_id: i64,
}

/// One scraped post before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPost {
    pub source: String,
    pub external_id: i64,
    pub url: String,
    /// Publish timestamp as shown by the feed, timezone dropped without
    /// conversion.
    pub published_at: NaiveDateTime,
    pub body: String,
    pub links: Vec<String>,
}

/// A collected post with all four enrichment fields populated.
/// Never persisted partially: either every field is present or the item
/// is abandoned for the cycle.
#[derive(Debug, Clone)]
pub struct EnrichedPost {
    pub source: String,
    pub external_id: i64,
    pub url: String,
    pub published_at: NaiveDateTime,
    pub body: String,
    pub links: Vec<String>,
    pub embedding: Vec<f32>,
    pub category: Category,
    pub summary: String,
    pub headline: String,
}

impl EnrichedPost {
    /// Pure mapping from a raw post plus the four enrichment results.
    pub fn from_parts(
        raw: RawPost,
        embedding: Vec<f32>,
        category: Category,
        summary: String,
        headline: String,
    ) -> Self {
        Self {
            source: raw.source,
            external_id: raw.external_id,
            url: raw.url,
            published_at: raw.published_at,
            body: raw.body,
            links: raw.links,
            embedding,
            category,
            summary,
            headline,
        }
    }
}

/// Extract the numeric suffix of a post's canonical URL, e.g.
/// `https://t.me/channel/1234` → `1234`. The suffix is only unique within
/// one source and is used as the per-source incremental cursor.
pub fn external_id_from_url(url: &str) -> Option<i64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}
