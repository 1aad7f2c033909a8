//! Chat-completion client.
//!
//! [`ExtractionOracle`] is the seam between the outline engine and
//! whatever model answers its analysis prompts. The production
//! implementation talks to an OpenAI-compatible `/chat/completions`
//! endpoint; tests substitute a scripted fake.

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::LlmConfig;

/// Answers an analysis prompt with raw model text.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    async fn extract(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// OpenAI-compatible chat client with exponential backoff on transient
/// failures.
pub struct ChatOracle {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl ChatOracle {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let api_key = env::var("LLM_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .context("set LLM_API_KEY or OPENAI_API_KEY for chat completions")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl ExtractionOracle for ChatOracle {
    async fn extract(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
        });

        let max_retries = self.config.max_retries;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let payload: Value = resp
                        .json()
                        .await
                        .context("chat completion response was not valid JSON")?;
                    let content = payload["choices"][0]["message"]["content"]
                        .as_str()
                        .context("chat completion response missing message content")?;
                    return Ok(content.to_string());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt > max_retries {
                        let detail = resp.text().await.unwrap_or_default();
                        bail!("chat completion failed with {}: {}", status, detail);
                    }
                    tracing::warn!(%status, attempt, "chat completion returned retryable status");
                }
                Err(e) => {
                    if attempt > max_retries {
                        return Err(e).context("chat completion request failed");
                    }
                    tracing::warn!(error = %e, attempt, "chat completion request error, retrying");
                }
            }

            let backoff = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(backoff).await;
        }
    }
}
