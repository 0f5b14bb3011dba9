use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Page {
    pub page_number: u32, // 1-based
    pub text: String,
}

impl Page {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// Atomic addressable span of source text; the citation granularity.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Unit {
    pub unit_id: String,
    pub doc_id: String,
    pub page_number: u32,
    pub sequence_index: u32, // Order within the page
    pub text: String,
    pub token_count: usize,
}

impl Unit {
    pub fn citation(&self) -> Citation {
        Citation::new(self.unit_id.clone(), self.page_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Citation {
    pub unit_id: String,
    pub page_number: u32,
}

impl Citation {
    pub fn new(unit_id: impl Into<String>, page_number: u32) -> Self {
        Self {
            unit_id: unit_id.into(),
            page_number,
        }
    }
}

/// Removes repeated citations, keeping the first occurrence of each.
pub fn dedup_citations<'a, I>(citations: I) -> Vec<Citation>
where
    I: IntoIterator<Item = &'a Citation>,
{
    let mut out: Vec<Citation> = Vec::new();
    for citation in citations {
        if !out.contains(citation) {
            out.push(citation.clone());
        }
    }
    out
}

/// Everything persisted for one ingested document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub source_name: Option<String>,
    pub content_hash: String, // SHA-256 hex of the cleaned page text
    pub created_at: DateTime<Utc>,
    pub pages: Vec<Page>,
    pub units: Vec<Unit>,
}

impl DocumentRecord {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn unit(&self, unit_id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.unit_id == unit_id)
    }
}

/// One generated assertion (bullet or sentence) and the citations it carries.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Claim {
    pub text: String,
    #[serde(default)]
    pub claimed_citations: Vec<Citation>,
    #[serde(default)]
    pub section_id: Option<String>,
}

impl Claim {
    pub fn new(text: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            text: text.into(),
            claimed_citations: dedup_citations(&citations),
            section_id: None,
        }
    }

    pub fn with_section(mut self, section_id: impl Into<String>) -> Self {
        self.section_id = Some(section_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportStatus {
    Supported,
    Unsupported,
    Contradicted,
}

impl SupportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportStatus::Supported => "supported",
            SupportStatus::Unsupported => "unsupported",
            SupportStatus::Contradicted => "contradicted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidatedClaim {
    pub text: String,
    pub claimed_citations: Vec<Citation>,
    pub section_id: Option<String>,
    pub valid_citations: Vec<Citation>, // Always a subset of claimed_citations
    pub support_status: SupportStatus,
}

impl ValidatedClaim {
    pub fn is_supported(&self) -> bool {
        self.support_status == SupportStatus::Supported
    }

    /// Distinct pages referenced by the valid citations, ascending.
    pub fn cited_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.valid_citations.iter().map(|c| c.page_number).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    Normal,
    SectionDetail,
    Scenario,
    Clarification,
    Conflict,
    NotFound,
}

impl AnswerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerType::Normal => "normal",
            AnswerType::SectionDetail => "section_detail",
            AnswerType::Scenario => "scenario",
            AnswerType::Clarification => "clarification",
            AnswerType::Conflict => "conflict",
            AnswerType::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

/// Final Q&A result. `citations` is the de-duplicated union of every claim's
/// valid citations in first-seen order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnswerEnvelope {
    pub answer_type: AnswerType,
    pub claims: Vec<ValidatedClaim>,
    pub confidence: f64,
    pub citations: Vec<Citation>,
}

impl AnswerEnvelope {
    pub fn new(answer_type: AnswerType, claims: Vec<ValidatedClaim>, confidence: f64) -> Self {
        let citations = dedup_citations(claims.iter().flat_map(|c| c.valid_citations.iter()));
        Self {
            answer_type,
            claims,
            confidence,
            citations,
        }
    }

    pub fn not_found(confidence_floor: f64) -> Self {
        Self::new(AnswerType::NotFound, Vec::new(), confidence_floor)
    }

    pub fn clarification(confidence: f64) -> Self {
        Self::new(AnswerType::Clarification, Vec::new(), confidence)
    }
}

/// Q&A result as presented to a caller: the envelope plus display text in
/// which every grounded sentence carries `(p. N)` page markers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QaResponse {
    pub doc_id: String,
    pub question: String,
    pub answer: String,
    pub envelope: AnswerEnvelope,
    pub confidence_level: ConfidenceLevel,
    pub disclaimer: String,
    #[serde(default)]
    pub validation_issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up_questions: Vec<String>,
}
