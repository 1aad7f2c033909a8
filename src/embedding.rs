//! Embedding API client.
//!
//! Talks to the companion embedding server. Passage embedding goes
//! through `/context`, which chunks server-side and returns one vector
//! per fragment; query embedding goes through `/query` with the
//! retrieval model and fails soft (an empty vector) so a flaky server
//! degrades retrieval instead of killing the run.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ApiConfig;

/// A passage with its embedding, ready for vector-store insertion.
#[derive(Debug, Clone)]
pub struct EmbeddedPassage {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Turns a retrieval query into an embedding vector. Failures surface
/// as an empty vector, never an error.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> Vec<f32>;
}

pub struct EmbeddingClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl EmbeddingClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// Embed one document chunk. The server may split the chunk further;
    /// each returned fragment gets an id of the form
    /// `chunk_{chunk_index}_{fragment_index}_{server_id}`.
    pub async fn embed_passages(
        &self,
        chunk_index: usize,
        text: &str,
    ) -> Result<Vec<EmbeddedPassage>> {
        let url = format!("{}/context", self.config.base_url.trim_end_matches('/'));
        let payload = self
            .post_with_retry(|| self.client.post(&url).query(&[("text", text)]))
            .await
            .context("passage embedding request failed")?;

        let items = payload
            .as_array()
            .context("embedding response was not a JSON array")?;

        let mut passages = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let server_id = item["id"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| item["id"].to_string());
            let chunk_text = item["chunk"]
                .as_str()
                .context("embedding response item missing chunk text")?;
            let vector = parse_vector(&item["emb"])
                .context("embedding response item missing emb vector")?;

            passages.push(EmbeddedPassage {
                id: format!("chunk_{}_{}_{}", chunk_index, i, server_id),
                text: chunk_text.to_string(),
                vector,
            });
        }

        Ok(passages)
    }

    async fn post_with_retry<F>(&self, build: F) -> Result<Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            match build().send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json().await.context("response was not valid JSON");
                }
                Ok(resp) => {
                    let status = resp.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt > self.config.max_retries {
                        let detail = resp.text().await.unwrap_or_default();
                        bail!("embedding API returned {}: {}", status, detail);
                    }
                    tracing::warn!(%status, attempt, "embedding API returned retryable status");
                }
                Err(e) => {
                    if attempt > self.config.max_retries {
                        return Err(e).context("embedding API request failed");
                    }
                    tracing::warn!(error = %e, attempt, "embedding API request error, retrying");
                }
            }

            let backoff = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(backoff).await;
        }
    }
}

#[async_trait]
impl QueryEmbedder for EmbeddingClient {
    async fn embed_query(&self, text: &str) -> Vec<f32> {
        let url = format!("{}/query", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "text": text,
            "model_name": "retrieve_query",
        });

        let result = self
            .post_with_retry(|| self.client.post(&url).json(&body))
            .await;

        match result {
            Ok(payload) => match payload.get(0).and_then(|item| parse_vector(&item["emb"])) {
                Some(vector) => vector,
                None => {
                    tracing::warn!("query embedding response missing emb vector");
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed");
                Vec::new()
            }
        }
    }
}

fn parse_vector(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Cosine similarity of two vectors; 0.0 for mismatched or zero-norm
/// inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
