use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use pgvector::Vector;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use newsline_common::timewindow::{resolve_window, TimeMode};
use newsline_common::types::{
    external_id_from_url, EnrichedPost, Source, SourceCursor, EMBEDDING_DIM,
};
use newsline_common::NewslineError;

pub struct NewsStore {
    pub(crate) pool: PgPool,
}

/// Per-item accounting for one batch write. `succeeded + failed == total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// A stored post joined with its source and category labels.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NewsRecord {
    pub url: String,
    pub published_at: NaiveDateTime,
    pub source: String,
    pub media_type: String,
    pub body: String,
    pub links: Vec<String>,
    pub headline: String,
    pub summary: String,
    pub category: String,
}

/// A news row with no embedding row yet. Input to the backfill job.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BacklogRow {
    pub url: String,
    pub published_at: NaiveDateTime,
    pub body: String,
}

#[derive(sqlx::FromRow)]
struct CursorRow {
    handle: String,
    title: String,
    media_type: String,
    strip_repost_prefix: bool,
    last_url: Option<String>,
}

impl NewsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Migration failed")?;
        Ok(())
    }

    /// Recompute the per-source collection cursor from durable rows.
    ///
    /// For each source with collection enabled, takes the most recently
    /// published stored row (bounded to the last month) and parses the
    /// numeric suffix from its URL. Sources with no rows map to 0. Always
    /// consistent with what is actually persisted, at the cost of a scan
    /// per run.
    pub async fn source_cursors(&self) -> Result<Vec<SourceCursor>> {
        let rows = sqlx::query_as::<_, CursorRow>(
            r#"
            SELECT s.handle, s.title, s.media_type, s.strip_repost_prefix,
                   latest.url AS last_url
            FROM sources s
            LEFT JOIN LATERAL (
                SELECT n.url
                FROM news n
                WHERE n.source_id = s.id
                  AND n.published_at > now()::timestamp - interval '1 month'
                ORDER BY n.published_at DESC
                LIMIT 1
            ) latest ON true
            WHERE s.collect
            ORDER BY s.handle
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let cursors = rows
            .into_iter()
            .map(|row| {
                let last_external_id = match row.last_url.as_deref() {
                    Some(url) => external_id_from_url(url).unwrap_or_else(|| {
                        warn!(source = %row.handle, url, "Stored URL has no numeric suffix, cursor reset to 0");
                        0
                    }),
                    None => 0,
                };
                SourceCursor {
                    source: Source {
                        handle: row.handle,
                        title: row.title,
                        media_type: row.media_type,
                        strip_repost_prefix: row.strip_repost_prefix,
                    },
                    last_external_id,
                }
            })
            .collect();

        Ok(cursors)
    }

    /// Write a run's enriched items, one insert per item.
    ///
    /// Conflict policy: `ON CONFLICT (url, published_at) DO NOTHING`,
    /// applied uniformly — a duplicate is a successful no-op, since the
    /// cursor is recomputed from durable rows and re-observing a stored
    /// post is normal. A per-item failure is logged with the offending
    /// URL and counted; sibling writes proceed.
    pub async fn insert_batch(
        &self,
        items_by_source: &HashMap<String, Vec<EnrichedPost>>,
    ) -> Result<WriteReport> {
        let mut report = WriteReport::default();

        for items in items_by_source.values() {
            for item in items {
                report.total += 1;
                match self.insert_news_row(item).await {
                    Ok(()) => {
                        report.succeeded += 1;
                        // The embedding row is written separately and may
                        // lag; a failure here leaves a backlog row for the
                        // backfill job instead of failing the item.
                        if let Err(e) =
                            self.insert_embedding(&item.url, item.published_at, &item.embedding).await
                        {
                            warn!(url = %item.url, error = %e, "Embedding write deferred to backfill");
                        }
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(url = %item.url, error = %e, "Failed to insert news item");
                    }
                }
            }
        }

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch write complete"
        );
        Ok(report)
    }

    async fn insert_news_row(&self, item: &EnrichedPost) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO news
                (url, published_at, source_id, body, links, headline, summary, category_id)
            VALUES
                ($1, $2,
                 (SELECT id FROM sources WHERE handle = $3),
                 $4, $5, $6, $7,
                 (SELECT id FROM categories WHERE label = $8))
            ON CONFLICT (url, published_at) DO NOTHING
            "#,
        )
        .bind(&item.url)
        .bind(item.published_at)
        .bind(&item.source)
        .bind(&item.body)
        .bind(&item.links)
        .bind(&item.headline)
        .bind(&item.summary)
        .bind(item.category.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert one embedding row, conflict-ignored on (url, published_at).
    pub async fn insert_embedding(
        &self,
        url: &str,
        published_at: NaiveDateTime,
        embedding: &[f32],
    ) -> Result<()> {
        if embedding.len() != EMBEDDING_DIM {
            return Err(NewslineError::Validation(format!(
                "Embedding for {url} has {} dimensions, expected {EMBEDDING_DIM}",
                embedding.len()
            ))
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO embeddings (url, published_at, embedding)
            VALUES ($1, $2, $3)
            ON CONFLICT (url, published_at) DO NOTHING
            "#,
        )
        .bind(url)
        .bind(published_at)
        .bind(Vector::from(embedding.to_vec()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stored posts within `[start, end]`, newest first.
    pub async fn news_for_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<NewsRecord>> {
        let rows = sqlx::query_as::<_, NewsRecord>(
            r#"
            SELECT n.url, n.published_at, s.handle AS source, s.media_type,
                   n.body, n.links, n.headline, n.summary, c.label AS category
            FROM news n
            JOIN sources s ON s.id = n.source_id
            JOIN categories c ON c.id = n.category_id
            WHERE n.published_at >= $1 AND n.published_at <= $2
            ORDER BY n.published_at DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Resolve a retrieval mode to a window, then query it.
    pub async fn news_for_window(
        &self,
        mode: TimeMode,
        now: NaiveDateTime,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<NewsRecord>> {
        let (start, end) = resolve_window(mode, now, start_date, end_date)?;
        self.news_for_range(start, end).await
    }

    /// News rows with no embedding row yet, oldest first. Keyset order
    /// matches the backfill job's batch walk.
    pub async fn missing_embeddings(&self, limit: i64) -> Result<Vec<BacklogRow>> {
        let rows = sqlx::query_as::<_, BacklogRow>(
            r#"
            SELECT n.url, n.published_at, n.body
            FROM news n
            WHERE NOT EXISTS (
                SELECT 1 FROM embeddings e
                WHERE e.url = n.url AND e.published_at = n.published_at
            )
            ORDER BY n.published_at, n.url
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
