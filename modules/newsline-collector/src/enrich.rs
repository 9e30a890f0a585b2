//! Enrichment orchestration: four concurrent inference capabilities per
//! source batch, merged back strictly by position.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use inference_client::InferenceService;
use newsline_common::types::{Category, EnrichedPost, RawPost, EMBEDDING_DIM};

pub struct Enricher {
    inference: Arc<dyn InferenceService>,
}

impl Enricher {
    pub fn new(inference: Arc<dyn InferenceService>) -> Self {
        Self { inference }
    }

    /// Enrich one source's batch of raw posts.
    ///
    /// Fail-fast by contract: the four capability calls are awaited
    /// jointly and any single failure abandons the whole batch — no
    /// partial enrichment, no per-item isolation, no retry. The posts are
    /// re-discovered next run because the cursor only advances on durable
    /// writes.
    pub async fn enrich(&self, source: &str, posts: Vec<RawPost>) -> Result<Vec<EnrichedPost>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = posts.iter().map(|p| p.body.clone()).collect();

        let (embeddings, labels, summaries, headlines) = futures::try_join!(
            async {
                self.inference
                    .embed_batch(&texts)
                    .await
                    .with_context(|| format!("Embedding batch failed for source {source}"))
            },
            async {
                self.inference
                    .classify_batch(&texts)
                    .await
                    .with_context(|| format!("Category batch failed for source {source}"))
            },
            async {
                self.inference
                    .summarize_batch(&texts)
                    .await
                    .with_context(|| format!("Summary batch failed for source {source}"))
            },
            async {
                self.inference
                    .headline_batch(&texts)
                    .await
                    .with_context(|| format!("Headline batch failed for source {source}"))
            },
        )?;

        // Results are merged by index; an unequal length means the
        // service broke the ordered-list contract and nothing in the
        // batch can be trusted.
        for (capability, len) in [
            ("embedding", embeddings.len()),
            ("category", labels.len()),
            ("summary", summaries.len()),
            ("headline", headlines.len()),
        ] {
            if len != posts.len() {
                bail!(
                    "{capability} batch for source {source} returned {len} results for {} inputs",
                    posts.len()
                );
            }
        }

        let count = posts.len();
        let mut enriched = Vec::with_capacity(count);
        for (((post, embedding), label), (summary, headline)) in posts
            .into_iter()
            .zip(embeddings)
            .zip(labels)
            .zip(summaries.into_iter().zip(headlines))
        {
            if embedding.len() != EMBEDDING_DIM {
                bail!(
                    "Embedding for {} has {} dimensions, expected {EMBEDDING_DIM}",
                    post.url,
                    embedding.len()
                );
            }
            let category = match Category::from_label(&label) {
                Some(c) => c,
                None => bail!("Unknown category label {label:?} for {}", post.url),
            };
            enriched.push(EnrichedPost::from_parts(
                post, embedding, category, summary, headline,
            ));
        }

        info!(source, count, "Batch enriched");
        Ok(enriched)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{raw_post, MockInference};

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let enricher = Enricher::new(Arc::new(MockInference::new()));
        let out = enricher.enrich("wire", Vec::new()).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn results_merge_by_position() {
        let enricher = Enricher::new(Arc::new(MockInference::new()));
        let posts = vec![
            raw_post("wire", 1),
            raw_post("wire", 2),
            raw_post("wire", 3),
        ];

        let enriched = enricher.enrich("wire", posts).await.unwrap();
        assert_eq!(enriched.len(), 3);
        for (i, item) in enriched.iter().enumerate() {
            // MockInference derives each result from the input index.
            assert_eq!(item.embedding[0], i as f32);
            assert_eq!(item.summary, format!("summary {i}"));
            assert_eq!(item.headline, format!("headline {i}"));
            assert_eq!(item.category, Category::ALL[i % Category::ALL.len()]);
            assert_eq!(item.external_id, (i + 1) as i64);
        }
    }

    #[tokio::test]
    async fn single_capability_failure_abandons_the_batch() {
        for capability in ["embed", "classify", "summarize", "headline"] {
            let enricher = Enricher::new(Arc::new(MockInference::new().failing(capability)));
            let posts = vec![raw_post("wire", 1), raw_post("wire", 2)];
            let err = enricher.enrich("wire", posts).await.unwrap_err();
            assert!(
                err.to_string().contains("source wire"),
                "error should name the source: {err}"
            );
        }
    }

    #[tokio::test]
    async fn length_mismatch_is_a_batch_failure() {
        let enricher = Enricher::new(Arc::new(MockInference::new().truncating_summaries()));
        let posts = vec![raw_post("wire", 1), raw_post("wire", 2)];
        let err = enricher.enrich("wire", posts).await.unwrap_err();
        assert!(err.to_string().contains("summary batch"), "{err}");
    }

    #[tokio::test]
    async fn unknown_category_label_is_a_batch_failure() {
        let enricher = Enricher::new(Arc::new(MockInference::new().with_labels(vec![
            "politics".to_string(),
            "weather".to_string(),
        ])));
        let posts = vec![raw_post("wire", 1), raw_post("wire", 2)];
        let err = enricher.enrich("wire", posts).await.unwrap_err();
        assert!(err.to_string().contains("Unknown category label"), "{err}");
    }
}
