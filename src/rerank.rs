//! Reranking client.
//!
//! A second-stage scorer that reorders retrieval candidates by semantic
//! relevance to the query. Kept behind a trait so the resolver can run
//! without one (falling back to vector-store order).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::config::ApiConfig;

/// Reorders candidate contexts by relevance, best first.
#[async_trait]
pub trait Rerank: Send + Sync {
    async fn rerank(&self, query: &str, contexts: &[String]) -> Result<Vec<String>>;
}

pub struct HttpReranker {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpReranker {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Rerank for HttpReranker {
    async fn rerank(&self, query: &str, contexts: &[String]) -> Result<Vec<String>> {
        let url = format!("{}/rerank", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "query": query,
            "contexts": contexts,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("rerank request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            bail!("rerank API returned {}: {}", status, detail);
        }

        let payload: serde_json::Value =
            resp.json().await.context("rerank response was not valid JSON")?;
        let items = payload
            .as_array()
            .context("rerank response was not a JSON array")?;

        // Items may be plain strings or objects carrying a "text" field.
        let mut ranked = Vec::with_capacity(items.len());
        for item in items {
            let text = item
                .as_str()
                .or_else(|| item["text"].as_str())
                .context("rerank response item had no text")?;
            ranked.push(text.to_string());
        }

        Ok(ranked)
    }
}
