//! Model response parsing.
//!
//! The outline engine asks the chat model for JSON in a documented shape.
//! Models frequently wrap their answer in a Markdown code fence and omit
//! optional fields, so parsing here strips fences first and leans on
//! serde defaults for anything missing.

use serde::Deserialize;

use crate::error::WeaveError;

/// One proposed section from a first-batch analysis.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionDraft {
    #[serde(default = "default_section_title")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub questions: Vec<String>,
}

fn default_section_title() -> String {
    "Untitled Section".to_string()
}

/// Analysis of the first batch: proposes the document title and the
/// initial section list.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAnalysis {
    #[serde(default)]
    pub document_type: String,
    #[serde(default = "default_document_title")]
    pub suggested_title: String,
    #[serde(default)]
    pub main_sections: Vec<SectionDraft>,
}

fn default_document_title() -> String {
    "Untitled Document".to_string()
}

/// Analysis of a follow-up batch: sections to add and existing sections
/// to enrich.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAnalysis {
    #[serde(default)]
    pub new_sections: Vec<SectionDraft>,
    #[serde(default)]
    pub updated_sections: Vec<SectionUpdate>,
}

/// A requested amendment to an existing section, matched by title.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionUpdate {
    pub title: String,
    #[serde(default)]
    pub updated_description: Option<String>,
    #[serde(default)]
    pub additional_questions: Vec<String>,
}

/// Remove a surrounding Markdown code fence (```json ... ``` or
/// ``` ... ```) if present, returning the inner text trimmed.
fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn parse_object<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, WeaveError> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        return Err(WeaveError::MalformedResponse(
            "model returned an empty response".to_string(),
        ));
    }

    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        WeaveError::MalformedResponse(format!("response is not valid JSON: {}", e))
    })?;
    if !value.is_object() {
        return Err(WeaveError::MalformedResponse(
            "response is not a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| WeaveError::MalformedResponse(format!("unexpected response shape: {}", e)))
}

/// Parse a first-batch analysis response.
pub fn parse_create(raw: &str) -> Result<CreateAnalysis, WeaveError> {
    parse_object(raw)
}

/// Parse a follow-up batch analysis response.
pub fn parse_update(raw: &str) -> Result<UpdateAnalysis, WeaveError> {
    parse_object(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATE_BODY: &str = r#"{
        "document_type": "technical report",
        "suggested_title": "Annual Review",
        "main_sections": [
            {"title": "Introduction", "description": "Opening", "order": 1,
             "questions": ["What is covered?"]}
        ]
    }"#;

    #[test]
    fn fenced_and_bare_json_parse_identically() {
        let bare = parse_create(CREATE_BODY).unwrap();
        let fenced = parse_create(&format!("```json\n{}\n```", CREATE_BODY)).unwrap();
        assert_eq!(bare.suggested_title, fenced.suggested_title);
        assert_eq!(bare.main_sections.len(), fenced.main_sections.len());
        assert_eq!(bare.main_sections[0].title, "Introduction");
    }

    #[test]
    fn plain_fence_without_language_tag_parses() {
        let fenced = format!("```\n{}\n```", CREATE_BODY);
        assert!(parse_create(&fenced).is_ok());
    }

    #[test]
    fn empty_response_is_malformed() {
        assert!(matches!(
            parse_create("   "),
            Err(WeaveError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_create("```json\n```"),
            Err(WeaveError::MalformedResponse(_))
        ));
    }

    #[test]
    fn non_object_response_is_malformed() {
        assert!(matches!(
            parse_create("[1, 2, 3]"),
            Err(WeaveError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_update("\"just a string\""),
            Err(WeaveError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let analysis = parse_create(r#"{"main_sections": [{}]}"#).unwrap();
        assert_eq!(analysis.suggested_title, "Untitled Document");
        assert_eq!(analysis.main_sections[0].title, "Untitled Section");
        assert!(analysis.main_sections[0].questions.is_empty());

        let update = parse_update("{}").unwrap();
        assert!(update.new_sections.is_empty());
        assert!(update.updated_sections.is_empty());
    }

    #[test]
    fn update_amendments_parse() {
        let update = parse_update(
            r#"{"updated_sections": [
                {"title": "Intro", "updated_description": "Refined",
                 "additional_questions": ["Why?"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(update.updated_sections.len(), 1);
        assert_eq!(
            update.updated_sections[0].updated_description.as_deref(),
            Some("Refined")
        );
    }
}
