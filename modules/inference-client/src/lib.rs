//! HTTP client for the external inference service.
//!
//! The service exposes one text-cleaning endpoint and four batch
//! capabilities (embeddings, categories, summaries, headlines). Every
//! batch endpoint takes an ordered list of strings and returns an
//! ordered list of equal length; the orchestrator merges results back
//! by position, so violating that contract misassigns results.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

/// Per-request timeout for the batch endpoints. Model inference on a
/// large batch can run for minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

// --- InferenceService trait ---

#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Clean one post body. Falls back to the raw text when the service
    /// declines, so cleaning never blocks collection.
    async fn clean_text(&self, text: &str, source: &str) -> Result<String>;

    /// 768-dimensional embedding per input text.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Category label per input text, drawn from the closed label set.
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<String>>;

    /// Summary per input text.
    async fn summarize_batch(&self, texts: &[String]) -> Result<Vec<String>>;

    /// Headline per input text.
    async fn headline_batch(&self, texts: &[String]) -> Result<Vec<String>>;
}

// --- HTTP implementation ---

pub struct InferenceClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CleanTextResponse {
    clean_text: Option<String>,
}

impl InferenceClient {
    pub fn new(base_url: &str) -> Self {
        info!(base_url, "Using inference service");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// POST an ordered list of texts and decode the equal-length response.
    async fn post_batch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        texts: &[String],
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(texts)
            .send()
            .await
            .with_context(|| format!("Inference request failed: {path}"))?
            .error_for_status()
            .with_context(|| format!("Inference service rejected request: {path}"))?;

        let out: Vec<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to decode inference response: {path}"))?;
        Ok(out)
    }
}

#[async_trait]
impl InferenceService for InferenceClient {
    async fn clean_text(&self, text: &str, source: &str) -> Result<String> {
        let url = format!("{}/services/clean_text", self.base_url);
        let body = serde_json::json!({ "text": text, "source": source });

        let resp = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(source, error = %e, "Clean-text request failed, keeping raw text");
                return Ok(text.to_string());
            }
        };

        if !resp.status().is_success() {
            warn!(source, status = %resp.status(), "Clean-text declined, keeping raw text");
            return Ok(text.to_string());
        }

        let parsed: CleanTextResponse = resp
            .json()
            .await
            .context("Failed to decode clean-text response")?;
        Ok(parsed.clean_text.unwrap_or_else(|| text.to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.post_batch("/models/generate_embs", texts).await
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<String>> {
        self.post_batch("/models/get_category", texts).await
    }

    async fn summarize_batch(&self, texts: &[String]) -> Result<Vec<String>> {
        self.post_batch("/models/generate_resumes", texts).await
    }

    async fn headline_batch(&self, texts: &[String]) -> Result<Vec<String>> {
        self.post_batch("/models/generate_headlines", texts).await
    }
}
