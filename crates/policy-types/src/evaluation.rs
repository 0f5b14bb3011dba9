//! Evaluation report types.
//!
//! A report is recomputed on demand and always replaces the previous one
//! for the same document.

use chrono::{DateTime, Utc};

use crate::types::SupportStatus;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EvaluationReport {
    pub doc_id: String,
    pub evaluated_at: DateTime<Utc>,
    pub faithfulness_score: f64,
    pub completeness_score: f64,
    pub simplicity_score: f64,
    /// Entries of the form `"<metric>:<reason>"`, in the order they occurred
    pub errors: Vec<String>,
    pub faithfulness: FaithfulnessReport,
    pub completeness: CompletenessReport,
    pub simplicity: SimplicityReport,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FaithfulnessReport {
    pub total_bullets: usize,
    pub supported: usize,
    pub unsupported: usize,
    pub contradicted: usize,
    pub hallucination_rate: f64,
    pub contradiction_rate: f64,
    pub details: Vec<BulletFinding>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BulletFinding {
    pub section_id: String,
    pub text_preview: String,
    pub status: SupportStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompletenessReport {
    pub sections: Vec<SectionCoverage>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SectionCoverage {
    pub section_id: String,
    pub weight: f64,
    pub score: f64,
    pub covered: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReadabilityStats {
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_sentence_length: f64,
    pub jargon_rate: f64,
    pub flesch_reading_ease: f64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimplicityReport {
    pub original: ReadabilityStats,
    pub summary: ReadabilityStats,
    pub sentence_length_reduction: f64,
    pub jargon_reduction: f64,
    pub readability_improvement: f64,
}
