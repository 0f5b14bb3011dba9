//! Policy summary records produced by the summarization pipeline.

use chrono::{DateTime, Utc};

use crate::types::{ConfidenceLevel, ValidatedClaim};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DocMetadata {
    pub doc_id: String,
    pub generated_at: DateTime<Utc>,
    pub total_pages: u32,
    #[serde(default)]
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SectionSummary {
    pub section_id: String,
    pub section_name: String,
    pub present: bool,
    #[serde(default)]
    pub bullets: Vec<ValidatedClaim>,
    #[serde(default)]
    pub not_found_message: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default = "default_level")]
    pub confidence_level: ConfidenceLevel,
    #[serde(default)]
    pub validation_issues: Vec<String>,
}

fn default_level() -> ConfidenceLevel {
    ConfidenceLevel::Low
}

impl SectionSummary {
    /// A section the document does not address.
    pub fn not_found(
        section_id: impl Into<String>,
        section_name: impl Into<String>,
        message: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            section_id: section_id.into(),
            section_name: section_name.into(),
            present: false,
            bullets: Vec::new(),
            not_found_message: Some(message.into()),
            confidence,
            confidence_level: ConfidenceLevel::Low,
            validation_issues: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PolicySummary {
    pub metadata: DocMetadata,
    pub disclaimer: String,
    pub sections: Vec<SectionSummary>,
}

impl PolicySummary {
    pub fn bullet_count(&self) -> usize {
        self.sections.iter().map(|s| s.bullets.len()).sum()
    }

    pub fn section(&self, section_id: &str) -> Option<&SectionSummary> {
        self.sections.iter().find(|s| s.section_id == section_id)
    }
}
