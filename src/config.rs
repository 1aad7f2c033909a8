use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Settings for the structured-extraction oracle (an OpenAI-compatible
/// chat completions endpoint). The API key comes from the environment
/// (`LLM_API_KEY`, falling back to `OPENAI_API_KEY`), never the file.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Settings for the embedding/reranking API server (`/context`,
/// `/query`, `/rerank`, `/health` endpoints).
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_api_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Qdrant connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff between retries is `backoff_base_secs * 2^attempt`.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_vector_dims")]
    pub vector_dims: usize,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base_secs(),
            vector_dims: default_vector_dims(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per semantic chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters of trailing context prepended to each chunk after the first.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// Maximum characters per analysis batch handed to the skeleton oracle.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Candidates fetched from the vector store per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidates kept after reranking (or fallback truncation).
    #[serde(default = "default_rerank_top_k")]
    pub rerank_top_k: usize,
    /// Maximum context snippets joined into a section's content.
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rerank_top_k: default_rerank_top_k(),
            context_limit: default_context_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Directory for intermediate skeleton dumps.
    #[serde(default = "default_debug_dir")]
    pub debug_dir: PathBuf,
    /// Abort on any batch failure instead of skip-and-continue.
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debug_dir: default_debug_dir(),
            fail_fast: false,
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_llm_max_tokens() -> u32 {
    4096
}
fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_api_timeout_secs() -> u64 {
    60
}
fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_secs() -> u64 {
    1
}
fn default_vector_dims() -> usize {
    768
}
fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}
fn default_max_batch_size() -> usize {
    5000
}
fn default_top_k() -> usize {
    20
}
fn default_rerank_top_k() -> usize {
    5
}
fn default_context_limit() -> usize {
    5
}
fn default_debug_dir() -> PathBuf {
    PathBuf::from("./debug")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be < chunking.chunk_size");
    }
    if config.chunking.max_batch_size == 0 {
        anyhow::bail!("chunking.max_batch_size must be > 0");
    }
    if config.retrieval.rerank_top_k == 0 {
        anyhow::bail!("retrieval.rerank_top_k must be >= 1");
    }
    if config.retrieval.top_k < config.retrieval.rerank_top_k {
        anyhow::bail!("retrieval.top_k must be >= retrieval.rerank_top_k");
    }
    if config.qdrant.vector_dims == 0 {
        anyhow::bail!("qdrant.vector_dims must be > 0");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_from_str(s: &str) -> Result<Config> {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(s.as_bytes()).unwrap();
        load_config(f.path())
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = load_from_str("").unwrap();
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.chunking.max_batch_size, 5000);
        assert_eq!(cfg.retrieval.top_k, 20);
        assert_eq!(cfg.retrieval.rerank_top_k, 5);
        assert_eq!(cfg.qdrant.vector_dims, 768);
        assert!(!cfg.pipeline.fail_fast);
    }

    #[test]
    fn overlap_must_be_less_than_chunk_size() {
        let err = load_from_str("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn top_k_must_cover_rerank_top_k() {
        let err = load_from_str("[retrieval]\ntop_k = 3\nrerank_top_k = 5\n").unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn partial_section_overrides() {
        let cfg =
            load_from_str("[llm]\nmodel = \"gpt-4o\"\n\n[chunking]\nchunk_size = 2000\n").unwrap();
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.llm.temperature, 0.3);
        assert_eq!(cfg.chunking.chunk_size, 2000);
        assert_eq!(cfg.chunking.overlap, 200);
    }
}
