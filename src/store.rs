//! Vector storage.
//!
//! [`VectorStore`] abstracts over where embeddings live. [`QdrantStore`]
//! is the production backend, speaking Qdrant's REST API with retries;
//! [`MemoryStore`] is a brute-force in-process implementation used by
//! tests and available for small offline runs.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::QdrantConfig;
use crate::embedding::cosine_similarity;

/// A vector plus the text it embeds, keyed by a store-unique id.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
}

/// One search result, best-first by similarity score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub text: String,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool>;
    async fn create_collection(&self, name: &str, dims: usize) -> Result<()>;
    async fn upsert(&self, collection: &str, points: &[VectorPoint]) -> Result<()>;
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>>;
}

const UPSERT_BATCH: usize = 100;

pub struct QdrantStore {
    client: reqwest::Client,
    config: QdrantConfig,
}

impl QdrantStore {
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(key) = &self.config.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    /// Send with exponential backoff (`backoff_base_secs * 2^attempt`).
    /// Client errors other than 429 fail immediately.
    async fn send_with_retry(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let mut attempt = 0u32;
        loop {
            let request = builder
                .try_clone()
                .context("request body is not cloneable for retry")?;

            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json()
                        .await
                        .context("Qdrant response was not valid JSON");
                }
                Ok(resp) => {
                    let status = resp.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt >= self.config.max_retries {
                        let detail = resp.text().await.unwrap_or_default();
                        bail!("Qdrant returned {}: {}", status, detail);
                    }
                    tracing::warn!(%status, attempt, "Qdrant returned retryable status");
                }
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        return Err(e).context("Qdrant request failed");
                    }
                    tracing::warn!(error = %e, attempt, "Qdrant request error, retrying");
                }
            }

            let backoff =
                Duration::from_secs(self.config.backoff_base_secs * (1 << attempt.min(5)));
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let path = format!("/collections/{}/exists", name);
        let payload = self
            .send_with_retry(self.request(reqwest::Method::GET, &path))
            .await?;
        Ok(payload["result"]["exists"].as_bool().unwrap_or(false))
    }

    async fn create_collection(&self, name: &str, dims: usize) -> Result<()> {
        let path = format!("/collections/{}", name);
        let body = json!({
            "vectors": {
                "size": dims,
                "distance": "Cosine",
                "on_disk": true,
            }
        });
        self.send_with_retry(self.request(reqwest::Method::PUT, &path).json(&body))
            .await
            .with_context(|| format!("failed to create collection {}", name))?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[VectorPoint]) -> Result<()> {
        let path = format!("/collections/{}/points?wait=true", collection);

        for batch in points.chunks(UPSERT_BATCH) {
            let body = json!({
                "points": batch
                    .iter()
                    .map(|p| {
                        json!({
                            "id": p.id,
                            "vector": p.vector,
                            "payload": {"text": p.text},
                        })
                    })
                    .collect::<Vec<_>>(),
            });

            self.send_with_retry(self.request(reqwest::Method::PUT, &path).json(&body))
                .await
                .with_context(|| format!("failed to upsert into {}", collection))?;
        }

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let path = format!("/collections/{}/points/search", collection);
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });

        let payload = self
            .send_with_retry(self.request(reqwest::Method::POST, &path).json(&body))
            .await
            .with_context(|| format!("search failed in {}", collection))?;

        let results = payload["result"]
            .as_array()
            .context("Qdrant search result was not an array")?;

        let hits = results
            .iter()
            .map(|item| {
                let id = item["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| item["id"].to_string());
                SearchHit {
                    id,
                    score: item["score"].as_f64().unwrap_or(0.0) as f32,
                    text: item["payload"]["text"].as_str().unwrap_or_default().to_string(),
                }
            })
            .collect();

        Ok(hits)
    }
}

/// Brute-force in-memory store. Collections are plain maps; search
/// computes cosine similarity against every point.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<VectorPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .collections
            .read()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?
            .contains_key(name))
    }

    async fn create_collection(&self, name: &str, _dims: usize) -> Result<()> {
        self.collections
            .write()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[VectorPoint]) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let stored = collections
            .get_mut(collection)
            .with_context(|| format!("unknown collection {}", collection))?;

        for point in points {
            match stored.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point.clone(),
                None => stored.push(point.clone()),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        let stored = collections
            .get(collection)
            .with_context(|| format!("unknown collection {}", collection))?;

        let mut hits: Vec<SearchHit> = stored
            .iter()
            .map(|p| SearchHit {
                id: p.id.clone(),
                score: cosine_similarity(vector, &p.vector),
                text: p.text.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, text: &str) -> VectorPoint {
        VectorPoint {
            id: id.to_string(),
            vector,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(!store.collection_exists("docs").await.unwrap());

        store.create_collection("docs", 2).await.unwrap();
        assert!(store.collection_exists("docs").await.unwrap());

        store
            .upsert(
                "docs",
                &[
                    point("a", vec![1.0, 0.0], "about cats"),
                    point("b", vec![0.0, 1.0], "about dogs"),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("docs", &[1.0, 0.1], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].text, "about cats");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let store = MemoryStore::new();
        store.create_collection("docs", 2).await.unwrap();
        let points: Vec<VectorPoint> = (0..10)
            .map(|i| point(&format!("p{}", i), vec![1.0, i as f32], "t"))
            .collect();
        store.upsert("docs", &points).await.unwrap();

        let hits = store.search("docs", &[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_ids() {
        let store = MemoryStore::new();
        store.create_collection("docs", 2).await.unwrap();
        store
            .upsert("docs", &[point("a", vec![1.0, 0.0], "old")])
            .await
            .unwrap();
        store
            .upsert("docs", &[point("a", vec![1.0, 0.0], "new")])
            .await
            .unwrap();

        let hits = store.search("docs", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "new");
    }

    #[tokio::test]
    async fn search_in_unknown_collection_errors() {
        let store = MemoryStore::new();
        assert!(store.search("missing", &[1.0], 5).await.is_err());
    }
}
