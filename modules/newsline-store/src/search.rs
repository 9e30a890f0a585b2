//! Semantic similarity retrieval over the embeddings table.

use anyhow::Result;
use chrono::NaiveDateTime;
use pgvector::Vector;

use newsline_common::types::EMBEDDING_DIM;
use newsline_common::NewslineError;

use crate::store::NewsStore;

/// One similarity hit, joined with descriptive metadata.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchHit {
    pub url: String,
    pub published_at: NaiveDateTime,
    pub headline: String,
    pub summary: String,
    pub body: String,
    pub links: Vec<String>,
    pub category: String,
    pub source: String,
    pub media_type: String,
    /// Cosine distance to the query vector; results are ordered by this,
    /// ascending.
    pub distance: f64,
}

impl NewsStore {
    /// Nearest stored posts to a query embedding, closest first.
    ///
    /// Two phases: the CTE ranks against the vector-indexed embeddings
    /// table alone (narrow projection, index-accelerated) and keeps only
    /// `limit` rows; the wide joins against news and the lookup tables
    /// then touch exactly those rows. Joining before ranking would force
    /// a full-table distance scan.
    pub async fn search_similar(&self, query: &[f32], limit: i64) -> Result<Vec<SearchHit>> {
        if query.len() != EMBEDDING_DIM {
            return Err(NewslineError::Validation(format!(
                "Query embedding has {} dimensions, expected {EMBEDDING_DIM}",
                query.len()
            ))
            .into());
        }
        if limit < 0 {
            return Err(NewslineError::Validation(format!(
                "Search limit must be non-negative, got {limit}"
            ))
            .into());
        }

        let rows = sqlx::query_as::<_, SearchHit>(
            r#"
            WITH nearest AS (
                SELECT e.url, e.published_at,
                       (e.embedding <=> $1)::float8 AS distance
                FROM embeddings e
                ORDER BY e.embedding <=> $1
                LIMIT $2
            )
            SELECT n.url, n.published_at, n.headline, n.summary, n.body,
                   n.links, c.label AS category, s.handle AS source,
                   s.media_type, nearest.distance
            FROM nearest
            JOIN news n
              ON n.url = nearest.url AND n.published_at = nearest.published_at
            JOIN sources s ON s.id = n.source_id
            JOIN categories c ON c.id = n.category_id
            ORDER BY nearest.distance ASC
            "#,
        )
        .bind(Vector::from(query.to_vec()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
