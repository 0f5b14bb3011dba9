//! Interfaces to the collaborators the pipeline delegates I/O to
//!
//! Retrieval, generation and persistence sit behind these traits so the
//! grounding components stay pure and the orchestration can be exercised
//! with in-process stand-ins.

use anyhow::Result;
use async_trait::async_trait;
use policy_types::{Claim, DocumentRecord, EvaluationReport, PolicySummary};
use serde::{Deserialize, Serialize};

use crate::prompts;
use crate::sections::CanonicalSection;

/// One retrieval hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedUnit {
    pub unit_id: String,
    pub page_number: u32,
    /// Position within the page
    #[serde(default)]
    pub sequence_index: u32,
    pub text: String,
    pub similarity: f64,
}

/// Ordered, deterministic similarity search over a document's units
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Best matches first; at most `top_k` results
    async fn retrieve(&self, doc_id: &str, query: &str, top_k: usize) -> Result<Vec<RetrievedUnit>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Bullets for one summary section
    Summary,
    /// Expanded bullets for one section in answer to a question
    SectionDetail,
    /// One claim per answer sentence
    Qa,
    /// Step-by-step hypothetical cost walk-through
    Scenario,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Summary => "summary",
            GenerationMode::SectionDetail => "section_detail",
            GenerationMode::Qa => "qa",
            GenerationMode::Scenario => "scenario",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub mode: GenerationMode,
    pub question: Option<String>,
    pub section: Option<CanonicalSection>,
    pub scenario_type: Option<String>,
    /// Units the generator may cite, in context order
    pub units: Vec<RetrievedUnit>,
    pub max_bullets: usize,
}

impl GenerationRequest {
    pub fn summary(section: CanonicalSection, units: Vec<RetrievedUnit>, max_bullets: usize) -> Self {
        Self {
            mode: GenerationMode::Summary,
            question: None,
            section: Some(section),
            scenario_type: None,
            units,
            max_bullets,
        }
    }

    pub fn section_detail(
        question: &str,
        section: CanonicalSection,
        units: Vec<RetrievedUnit>,
        max_bullets: usize,
    ) -> Self {
        Self {
            mode: GenerationMode::SectionDetail,
            question: Some(question.to_string()),
            ..Self::summary(section, units, max_bullets)
        }
    }

    pub fn qa(question: &str, units: Vec<RetrievedUnit>) -> Self {
        Self {
            mode: GenerationMode::Qa,
            question: Some(question.to_string()),
            section: None,
            scenario_type: None,
            units,
            max_bullets: 0,
        }
    }

    pub fn scenario(question: &str, scenario_type: &str, units: Vec<RetrievedUnit>) -> Self {
        Self {
            mode: GenerationMode::Scenario,
            scenario_type: Some(scenario_type.to_string()),
            ..Self::qa(question, units)
        }
    }

    /// Labelled context block handed to the model
    pub fn context(&self) -> String {
        prompts::build_context(&self.units)
    }
}

/// Produces raw, untrusted claims from retrieved context
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Claim>>;
}

/// Whole-record persistence keyed by document id
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put_document(&self, record: &DocumentRecord) -> Result<()>;

    async fn get_document(&self, doc_id: &str) -> Result<Option<DocumentRecord>>;

    /// Removes the document and everything derived from it. Returns false
    /// when nothing was stored under `doc_id`.
    async fn delete_document(&self, doc_id: &str) -> Result<bool>;

    async fn put_summary(&self, doc_id: &str, summary: &PolicySummary) -> Result<()>;

    async fn get_summary(&self, doc_id: &str) -> Result<Option<PolicySummary>>;

    async fn put_evaluation(&self, report: &EvaluationReport) -> Result<()>;

    async fn get_evaluation(&self, doc_id: &str) -> Result<Option<EvaluationReport>>;

    async fn list_documents(&self) -> Result<Vec<String>>;
}
