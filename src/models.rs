//! Core data models for the report pipeline.
//!
//! The skeleton and its sections are the only state threaded across
//! pipeline stages; chunks and batches are transient `String`s produced
//! and consumed within one pass. Field order matches the JSON shape of
//! the debug skeleton dump.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One section of the evolving report outline.
///
/// Owned exclusively by its parent [`ReportSkeleton`]. The merge engine
/// may grow `description` and `questions` in place; `content` is written
/// exactly once, by the content resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSection {
    /// Unique, stable once created.
    pub section_id: String,
    pub title: String,
    pub description: String,
    /// Assigned at merge time; appended sections get `len + 1`.
    pub order: u32,
    /// Back-reference to a parent section id, no ownership.
    pub parent_section: Option<String>,
    pub questions: Vec<String>,
    /// Filled only by the content resolver, terminal once set.
    pub content: Option<String>,
}

/// The evolving structured outline of a document.
///
/// Created on the first batch; every later batch mutates the same
/// instance. `version` increments by exactly 1 per update batch and
/// never on creation or reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSkeleton {
    pub document_id: String,
    pub title: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Insertion order is creation order; sections are never removed.
    pub main_sections: Vec<DocumentSection>,
}

impl ReportSkeleton {
    /// Total questions across all sections.
    pub fn question_count(&self) -> usize {
        self.main_sections.iter().map(|s| s.questions.len()).sum()
    }
}
