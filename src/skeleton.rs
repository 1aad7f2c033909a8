//! Incremental outline construction.
//!
//! [`SkeletonEngine`] feeds document batches through the extraction
//! oracle one at a time. The first batch creates the skeleton; every
//! later batch can append new sections and enrich existing ones. The
//! merge is strictly additive: sections are never removed or reordered,
//! and each successful update bumps the skeleton version exactly once.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::analysis::{self, CreateAnalysis, SectionDraft, UpdateAnalysis};
use crate::error::WeaveError;
use crate::models::{DocumentSection, ReportSkeleton};
use crate::oracle::ExtractionOracle;

const SYSTEM_PROMPT: &str = "You are a document analyst. You read fragments of a long document \
and maintain a structured outline of it. Always respond with a single JSON object in exactly \
the requested format, with no commentary outside the JSON.";

pub struct SkeletonEngine {
    oracle: Arc<dyn ExtractionOracle>,
    /// When set, a failed mid-stream batch aborts the run instead of
    /// being skipped.
    fail_fast: bool,
}

impl SkeletonEngine {
    pub fn new(oracle: Arc<dyn ExtractionOracle>, fail_fast: bool) -> Self {
        Self { oracle, fail_fast }
    }

    /// Build a skeleton by folding every batch in order. The first batch
    /// must yield a usable analysis; later batches are best-effort unless
    /// `fail_fast` is set. `title` overrides the model's suggested title.
    pub async fn process_batches(
        &self,
        document_id: &str,
        batches: &[String],
        title: Option<&str>,
    ) -> Result<ReportSkeleton> {
        if batches.is_empty() {
            return Err(WeaveError::InvalidInput("no batches to analyze".to_string()).into());
        }

        let mut skeleton = self.create(document_id, &batches[0]).await?;
        if let Some(title) = title {
            skeleton.title = title.to_string();
        }
        tracing::info!(
            sections = skeleton.main_sections.len(),
            "created initial skeleton from first batch"
        );

        for (index, batch) in batches.iter().enumerate().skip(1) {
            match self.update(&mut skeleton, batch).await {
                Ok(()) => {
                    tracing::debug!(batch = index, version = skeleton.version, "merged batch");
                }
                Err(e) if self.fail_fast => {
                    return Err(e).with_context(|| format!("batch {} failed", index));
                }
                Err(e) => {
                    tracing::warn!(batch = index, error = %e, "skipping failed batch");
                }
            }
        }

        Ok(skeleton)
    }

    /// Analyze the first batch and materialize the initial skeleton.
    async fn create(&self, document_id: &str, batch: &str) -> Result<ReportSkeleton> {
        let prompt = initial_prompt(batch);
        let raw = self
            .oracle
            .extract(SYSTEM_PROMPT, &prompt)
            .await
            .context("initial batch analysis failed")?;
        let parsed = analysis::parse_create(&raw)?;
        Ok(apply_create(document_id, parsed))
    }

    /// Analyze a follow-up batch against the current outline and merge
    /// the result in. The skeleton is only touched after a successful
    /// parse, so a failure leaves it unchanged.
    async fn update(&self, skeleton: &mut ReportSkeleton, batch: &str) -> Result<()> {
        let prompt = update_prompt(&summarize(skeleton), batch);
        let raw = self.oracle.extract(SYSTEM_PROMPT, &prompt).await?;
        let parsed = analysis::parse_update(&raw)?;
        apply_update(skeleton, parsed);
        Ok(())
    }
}

fn new_section(draft: SectionDraft, order: u32) -> DocumentSection {
    DocumentSection {
        section_id: Uuid::new_v4().to_string(),
        title: draft.title,
        description: draft.description,
        order,
        parent_section: None,
        questions: draft.questions,
        content: None,
    }
}

fn apply_create(document_id: &str, analysis: CreateAnalysis) -> ReportSkeleton {
    let now = Utc::now();
    let main_sections = analysis
        .main_sections
        .into_iter()
        .map(|draft| {
            let order = draft.order;
            new_section(draft, order)
        })
        .collect();

    ReportSkeleton {
        document_id: document_id.to_string(),
        title: analysis.suggested_title,
        version: 1,
        created_at: now,
        updated_at: now,
        main_sections,
    }
}

/// Merge a follow-up analysis. New sections are appended after all
/// existing ones regardless of the order the model proposed; updates
/// match the first existing section whose title contains the target
/// title, and unmatched updates are dropped.
fn apply_update(skeleton: &mut ReportSkeleton, analysis: UpdateAnalysis) {
    for draft in analysis.new_sections {
        let order = skeleton.main_sections.len() as u32 + 1;
        skeleton.main_sections.push(new_section(draft, order));
    }

    for update in analysis.updated_sections {
        let target = skeleton
            .main_sections
            .iter_mut()
            .find(|s| s.title.contains(&update.title));

        match target {
            Some(section) => {
                if let Some(description) = update.updated_description {
                    section.description = description;
                }
                section.questions.extend(update.additional_questions);
            }
            None => {
                tracing::debug!(title = %update.title, "dropping update for unknown section");
            }
        }
    }

    skeleton.version += 1;
    skeleton.updated_at = Utc::now();
}

/// Compact text rendering of the current outline, embedded in update
/// prompts so the model knows what already exists.
pub fn summarize(skeleton: &ReportSkeleton) -> String {
    let mut out = format!(
        "Document: {} (version {})\nSections:\n",
        skeleton.title, skeleton.version
    );
    for section in &skeleton.main_sections {
        out.push_str(&format!(
            "{}. {} - {} (Questions: {})\n",
            section.order,
            section.title,
            section.description,
            section.questions.len()
        ));
    }
    out
}

fn initial_prompt(batch: &str) -> String {
    format!(
        r#"Analyze this first part of a document and propose an outline for the full document.

Respond with JSON in exactly this format:
{{
  "document_type": "<kind of document>",
  "suggested_title": "<title for the document>",
  "main_sections": [
    {{
      "title": "<section title>",
      "description": "<one-sentence description>",
      "order": <number>,
      "questions": ["<question this section should answer>"]
    }}
  ]
}}

Document text:
{}"#,
        batch
    )
}

fn update_prompt(outline: &str, batch: &str) -> String {
    format!(
        r#"Here is the current outline of a document, followed by the next part of its text.
Decide which new sections to add and which existing sections to enrich.

Current outline:
{}

Respond with JSON in exactly this format:
{{
  "new_sections": [
    {{
      "title": "<section title>",
      "description": "<one-sentence description>",
      "order": <number>,
      "questions": ["<question this section should answer>"]
    }}
  ],
  "updated_sections": [
    {{
      "title": "<existing section title to update>",
      "updated_description": "<replacement description, or omit>",
      "additional_questions": ["<extra question>"]
    }}
  ]
}}

Next part of the document:
{}"#,
        outline, batch
    )
}

/// Write a timestamped pretty-printed snapshot of the skeleton under
/// `dir`, creating the directory if needed. Returns the file path.
pub fn dump_skeleton(skeleton: &ReportSkeleton, dir: &Path) -> Result<std::path::PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create debug directory {}", dir.display()))?;

    let filename = format!("skeleton_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
    let path = dir.join(filename);
    let json = serde_json::to_string_pretty(skeleton).context("failed to serialize skeleton")?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write skeleton dump {}", path.display()))?;

    Ok(path)
}
