//! Section content resolution.
//!
//! Fills each skeleton section with retrieved context: the section's
//! questions (or its description when it has none) are embedded, matched
//! against the document's vector collection, optionally reranked, and
//! the best snippets are joined into the section content. Resolution is
//! best-effort per section; one failing section never aborts the rest.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;

use crate::embedding::QueryEmbedder;
use crate::models::ReportSkeleton;
use crate::rerank::Rerank;
use crate::store::VectorStore;

pub struct ContentResolver {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn QueryEmbedder>,
    reranker: Option<Arc<dyn Rerank>>,
    top_k: usize,
    rerank_top_k: usize,
}

impl ContentResolver {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn QueryEmbedder>,
        reranker: Option<Arc<dyn Rerank>>,
        top_k: usize,
        rerank_top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            reranker,
            top_k,
            rerank_top_k,
        }
    }

    /// Retrieve context snippets for one query, reranked when a reranker
    /// is configured and there are more candidates than it should keep.
    /// A rerank failure falls back to vector-store order, truncated.
    async fn retrieve(&self, collection: &str, query: &str) -> Result<Vec<String>> {
        let query_vector = self.embedder.embed_query(query).await;
        if query_vector.is_empty() {
            tracing::warn!(query, "query embedding unavailable, skipping retrieval");
            return Ok(Vec::new());
        }

        let hits = self.store.search(collection, &query_vector, self.top_k).await?;
        let candidates: Vec<String> = hits.into_iter().map(|h| h.text).collect();

        if candidates.len() <= self.rerank_top_k {
            return Ok(candidates);
        }

        match &self.reranker {
            Some(reranker) => match reranker.rerank(query, &candidates).await {
                Ok(ranked) => Ok(ranked.into_iter().take(self.rerank_top_k).collect()),
                Err(e) => {
                    tracing::warn!(error = %e, "rerank failed, keeping retrieval order");
                    Ok(candidates.into_iter().take(self.rerank_top_k).collect())
                }
            },
            None => Ok(candidates.into_iter().take(self.rerank_top_k).collect()),
        }
    }

    /// Resolve content for every unresolved section in place. Snippets
    /// are deduplicated in first-seen order and capped at
    /// `context_limit` per section. Returns how many sections got
    /// content this call.
    pub async fn resolve(
        &self,
        skeleton: &mut ReportSkeleton,
        collection: &str,
        context_limit: usize,
    ) -> usize {
        let mut resolved = 0usize;

        for section in &mut skeleton.main_sections {
            // Content is written exactly once per section.
            if section.content.is_some() {
                continue;
            }

            let queries: Vec<String> = if section.questions.is_empty() {
                vec![section.description.clone()]
            } else {
                section.questions.clone()
            };

            let mut seen = HashSet::new();
            let mut snippets: Vec<String> = Vec::new();

            for query in &queries {
                if query.trim().is_empty() {
                    continue;
                }
                match self.retrieve(collection, query).await {
                    Ok(contexts) => {
                        for context in contexts {
                            if seen.insert(context.clone()) {
                                snippets.push(context);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            section = %section.title,
                            error = %e,
                            "retrieval failed for section query"
                        );
                    }
                }
            }

            if snippets.is_empty() {
                tracing::debug!(section = %section.title, "no context found, leaving unresolved");
                continue;
            }

            snippets.truncate(context_limit);
            section.content = Some(snippets.join("\n\n"));
            resolved += 1;
        }

        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentSection;
    use crate::store::{MemoryStore, VectorPoint};
    use async_trait::async_trait;
    use chrono::Utc;

    /// Maps known query words onto axis-aligned vectors; unknown queries
    /// embed as empty (the fail-soft contract).
    struct StubEmbedder;

    #[async_trait]
    impl QueryEmbedder for StubEmbedder {
        async fn embed_query(&self, text: &str) -> Vec<f32> {
            if text.contains("cats") {
                vec![1.0, 0.0]
            } else if text.contains("dogs") {
                vec![0.0, 1.0]
            } else {
                Vec::new()
            }
        }
    }

    /// Reverses the candidate order so tests can tell rerank ran.
    struct ReversingReranker;

    #[async_trait]
    impl Rerank for ReversingReranker {
        async fn rerank(&self, _query: &str, contexts: &[String]) -> Result<Vec<String>> {
            let mut reversed = contexts.to_vec();
            reversed.reverse();
            Ok(reversed)
        }
    }

    fn section(title: &str, questions: Vec<&str>) -> DocumentSection {
        DocumentSection {
            section_id: format!("id-{}", title),
            title: title.to_string(),
            description: format!("About {}", title),
            order: 1,
            parent_section: None,
            questions: questions.into_iter().map(str::to_string).collect(),
            content: None,
        }
    }

    fn skeleton_with(sections: Vec<DocumentSection>) -> ReportSkeleton {
        let now = Utc::now();
        ReportSkeleton {
            document_id: "doc-1".to_string(),
            title: "Test".to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
            main_sections: sections,
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.create_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                &[
                    VectorPoint {
                        id: "a".to_string(),
                        vector: vec![1.0, 0.0],
                        text: "cats sleep a lot".to_string(),
                    },
                    VectorPoint {
                        id: "b".to_string(),
                        vector: vec![0.9, 0.1],
                        text: "cats purr".to_string(),
                    },
                    VectorPoint {
                        id: "c".to_string(),
                        vector: vec![0.0, 1.0],
                        text: "dogs bark".to_string(),
                    },
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn sections_get_content_from_their_questions() {
        let store = seeded_store().await;
        let resolver = ContentResolver::new(store, Arc::new(StubEmbedder), None, 10, 5);

        let mut skeleton =
            skeleton_with(vec![section("Cats", vec!["What do cats do all day?"])]);
        let resolved = resolver.resolve(&mut skeleton, "docs", 5).await;

        assert_eq!(resolved, 1);
        let content = skeleton.main_sections[0].content.as_deref().unwrap();
        assert!(content.contains("cats sleep a lot"));
        assert!(content.contains("cats purr"));
    }

    #[tokio::test]
    async fn description_is_fallback_query_when_no_questions() {
        let store = seeded_store().await;
        let resolver = ContentResolver::new(store, Arc::new(StubEmbedder), None, 10, 5);

        // Description "About dogs" matches the stub embedder.
        let mut skeleton = skeleton_with(vec![section("dogs", vec![])]);
        let resolved = resolver.resolve(&mut skeleton, "docs", 5).await;

        assert_eq!(resolved, 1);
        assert!(skeleton.main_sections[0]
            .content
            .as_deref()
            .unwrap()
            .contains("dogs bark"));
    }

    #[tokio::test]
    async fn unembeddable_queries_leave_section_unresolved() {
        let store = seeded_store().await;
        let resolver = ContentResolver::new(store, Arc::new(StubEmbedder), None, 10, 5);

        let mut skeleton = skeleton_with(vec![section("Birds", vec!["What about birds?"])]);
        let resolved = resolver.resolve(&mut skeleton, "docs", 5).await;

        assert_eq!(resolved, 0);
        assert!(skeleton.main_sections[0].content.is_none());
    }

    #[tokio::test]
    async fn existing_content_is_never_overwritten() {
        let store = seeded_store().await;
        let resolver = ContentResolver::new(store, Arc::new(StubEmbedder), None, 10, 5);

        let mut sec = section("Cats", vec!["What do cats do?"]);
        sec.content = Some("already written".to_string());
        let mut skeleton = skeleton_with(vec![sec]);

        let resolved = resolver.resolve(&mut skeleton, "docs", 5).await;
        assert_eq!(resolved, 0);
        assert_eq!(
            skeleton.main_sections[0].content.as_deref(),
            Some("already written")
        );
    }

    #[tokio::test]
    async fn duplicate_snippets_collapse_and_limit_applies() {
        let store = seeded_store().await;
        let resolver = ContentResolver::new(store, Arc::new(StubEmbedder), None, 10, 5);

        // Two near-identical questions retrieve the same snippets.
        let mut skeleton = skeleton_with(vec![section(
            "Cats",
            vec!["What do cats do?", "Tell me about cats."],
        )]);
        resolver.resolve(&mut skeleton, "docs", 1).await;

        let content = skeleton.main_sections[0].content.as_deref().unwrap();
        // Capped to a single snippet despite two queries.
        assert!(!content.contains("\n\n"));
    }

    #[tokio::test]
    async fn reranker_reorders_when_candidates_exceed_keep_count() {
        let store = seeded_store().await;
        let resolver = ContentResolver::new(
            store,
            Arc::new(StubEmbedder),
            Some(Arc::new(ReversingReranker)),
            10,
            1,
        );

        let ranked = resolver.retrieve("docs", "cats").await.unwrap();
        // Three candidates > keep 1, so the reranker's (reversed) first
        // item wins instead of the top similarity hit.
        assert_eq!(ranked.len(), 1);
        assert_ne!(ranked[0], "cats sleep a lot");
    }

    #[tokio::test]
    async fn few_candidates_skip_reranking() {
        let store = seeded_store().await;
        let resolver = ContentResolver::new(
            store,
            Arc::new(StubEmbedder),
            Some(Arc::new(ReversingReranker)),
            10,
            5,
        );

        let ranked = resolver.retrieve("docs", "cats").await.unwrap();
        // Only three candidates for keep 5: vector-store order preserved.
        assert_eq!(ranked[0], "cats sleep a lot");
    }
}
