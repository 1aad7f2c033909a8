//! End-to-end document runs.
//!
//! Wires the stages together: load text, split into chunks, embed and
//! index them, assemble analysis batches, build the outline skeleton,
//! and resolve section content from the index. Also provides the
//! outline-only flow (no vector store) and a connectivity probe.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::batch;
use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::loader;
use crate::models::ReportSkeleton;
use crate::oracle::ChatOracle;
use crate::rerank::HttpReranker;
use crate::resolver::ContentResolver;
use crate::skeleton::{dump_skeleton, SkeletonEngine};
use crate::splitter;
use crate::store::{QdrantStore, VectorPoint, VectorStore};

/// Deterministic per-document collection name derived from the file
/// name, so re-running the same file reuses its index.
pub fn collection_name(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");
    let digest = Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes());
    format!("doc_{}", &digest.simple().to_string()[..16])
}

/// Full pipeline: index the document, build its skeleton, resolve
/// section content, and dump the result.
pub async fn run(config: &Config, path: &Path) -> Result<ReportSkeleton> {
    let text = loader::load(path)?;
    let chunks = splitter::split(&text, config.chunking.chunk_size, config.chunking.overlap)?;
    println!("Split {} into {} chunks", path.display(), chunks.len());

    let store = Arc::new(QdrantStore::new(config.qdrant.clone())?);
    let embedder = Arc::new(EmbeddingClient::new(config.api.clone())?);
    let collection = collection_name(path);

    if store.collection_exists(&collection).await? {
        println!("Reusing existing collection {}", collection);
    } else {
        store
            .create_collection(&collection, config.qdrant.vector_dims)
            .await?;
        index_chunks(store.as_ref(), &embedder, &collection, &chunks).await?;
    }

    let batches = batch::assemble(&chunks, config.chunking.max_batch_size);
    println!("Assembled {} analysis batches", batches.len());

    let oracle = Arc::new(ChatOracle::new(config.llm.clone())?);
    let engine = SkeletonEngine::new(oracle, config.pipeline.fail_fast);
    let document_id = Uuid::new_v4().to_string();
    let mut skeleton = engine.process_batches(&document_id, &batches, None).await?;
    println!(
        "Built skeleton \"{}\" with {} sections (version {})",
        skeleton.title,
        skeleton.main_sections.len(),
        skeleton.version
    );

    let reranker = Arc::new(HttpReranker::new(config.api.clone())?);
    let resolver = ContentResolver::new(
        store,
        embedder,
        Some(reranker),
        config.retrieval.top_k,
        config.retrieval.rerank_top_k,
    );
    let resolved = resolver
        .resolve(&mut skeleton, &collection, config.retrieval.context_limit)
        .await;
    println!(
        "Resolved content for {}/{} sections",
        resolved,
        skeleton.main_sections.len()
    );
    print!("{}", report_summary(&skeleton));

    let dump_path = dump_skeleton(&skeleton, &config.pipeline.debug_dir)?;
    println!("Skeleton written to {}", dump_path.display());

    Ok(skeleton)
}

/// Per-section closing summary for a full run: every section with its
/// resolved content length, unresolved sections flagged as such.
fn report_summary(skeleton: &ReportSkeleton) -> String {
    let mut out = String::from("Report sections:\n");
    for section in &skeleton.main_sections {
        match &section.content {
            Some(content) => out.push_str(&format!(
                "  {}. {} - {} chars\n",
                section.order,
                section.title,
                content.chars().count()
            )),
            None => out.push_str(&format!(
                "  {}. {} - no content\n",
                section.order, section.title
            )),
        }
    }
    out
}

/// Embed every chunk and upsert the resulting passages. Chunks whose
/// embedding comes back empty are skipped with a warning.
async fn index_chunks(
    store: &dyn VectorStore,
    embedder: &EmbeddingClient,
    collection: &str,
    chunks: &[String],
) -> Result<()> {
    let mut points = Vec::new();

    for (index, chunk) in chunks.iter().enumerate() {
        let passages = embedder
            .embed_passages(index, chunk)
            .await
            .with_context(|| format!("failed to embed chunk {}", index))?;

        for passage in passages {
            if passage.vector.is_empty() {
                tracing::warn!(id = %passage.id, "skipping passage with empty embedding");
                continue;
            }
            // Qdrant point ids must be UUIDs or integers.
            points.push(VectorPoint {
                id: Uuid::new_v4().to_string(),
                vector: passage.vector,
                text: passage.text,
            });
        }
    }

    println!("Indexing {} passages into {}", points.len(), collection);
    store.upsert(collection, &points).await
}

/// Outline-only flow: no embedding, no vector store, no content
/// resolution. Useful for a fast structural pass over a document.
pub async fn outline(
    config: &Config,
    path: &Path,
    title: Option<&str>,
    fail_fast: bool,
) -> Result<ReportSkeleton> {
    let text = loader::load(path)?;
    let chunks = splitter::split(&text, config.chunking.chunk_size, config.chunking.overlap)?;
    let batches = batch::assemble(&chunks, config.chunking.max_batch_size);
    println!(
        "Split {} into {} chunks, {} batches",
        path.display(),
        chunks.len(),
        batches.len()
    );

    let oracle = Arc::new(ChatOracle::new(config.llm.clone())?);
    let engine = SkeletonEngine::new(oracle, fail_fast || config.pipeline.fail_fast);
    let document_id = Uuid::new_v4().to_string();
    let skeleton = engine.process_batches(&document_id, &batches, title).await?;

    let dump_path = dump_skeleton(&skeleton, &config.pipeline.debug_dir)?;
    println!(
        "Outline \"{}\": {} sections, {} questions (version {}), written to {}",
        skeleton.title,
        skeleton.main_sections.len(),
        skeleton.question_count(),
        skeleton.version,
        dump_path.display()
    );

    Ok(skeleton)
}

/// Probe each external dependency and report status. Never errors; a
/// dead service is a report line, not a failure.
pub async fn health(config: &Config) {
    let client = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            println!("health check unavailable: {}", e);
            return;
        }
    };

    let api_url = format!("{}/health", config.api.base_url.trim_end_matches('/'));
    report(&client, "embedding API", &api_url).await;

    let qdrant_url = format!("{}/collections", config.qdrant.url.trim_end_matches('/'));
    report(&client, "qdrant", &qdrant_url).await;

    let llm_url = format!("{}/models", config.llm.base_url.trim_end_matches('/'));
    report(&client, "llm endpoint", &llm_url).await;
}

async fn report(client: &reqwest::Client, name: &str, url: &str) {
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => println!("{:<14} ok       {}", name, url),
        Ok(resp) => println!("{:<14} {}  {}", name, resp.status(), url),
        Err(e) => println!("{:<14} down     {} ({})", name, url, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_is_deterministic() {
        let a = collection_name(Path::new("/tmp/report.pdf"));
        let b = collection_name(Path::new("/other/dir/report.pdf"));
        assert_eq!(a, b);
        assert!(a.starts_with("doc_"));
        assert_eq!(a.len(), "doc_".len() + 16);
    }

    #[test]
    fn different_files_get_different_collections() {
        let a = collection_name(Path::new("alpha.txt"));
        let b = collection_name(Path::new("beta.txt"));
        assert_ne!(a, b);
    }

    #[test]
    fn report_summary_lists_content_lengths_and_gaps() {
        use crate::models::{DocumentSection, ReportSkeleton};
        use chrono::Utc;

        let section = |order: u32, title: &str, content: Option<&str>| DocumentSection {
            section_id: format!("id-{}", order),
            title: title.to_string(),
            description: String::new(),
            order,
            parent_section: None,
            questions: Vec::new(),
            content: content.map(str::to_string),
        };

        let now = Utc::now();
        let skeleton = ReportSkeleton {
            document_id: "doc-1".to_string(),
            title: "Test".to_string(),
            version: 2,
            created_at: now,
            updated_at: now,
            main_sections: vec![
                section(1, "History", Some("ab cd")),
                section(2, "Appendix", None),
            ],
        };

        let summary = report_summary(&skeleton);
        assert!(summary.contains("  1. History - 5 chars\n"));
        assert!(summary.contains("  2. Appendix - no content\n"));
    }
}
