//! Citation validation
//!
//! Every generated claim passes through [`CitationValidator`] before it can
//! reach a user or a score. A citation is valid only when its unit exists in
//! the document **and** the stated page matches that unit's page. The claim
//! is then checked against each valid cited unit for support (token overlap
//! or a shared figure) and contradiction.

use std::collections::HashMap;
use std::sync::Arc;

use policy_types::{Citation, Claim, SupportStatus, Unit, ValidatedClaim};
use tracing::debug;

use crate::config::ValidationConfig;
use crate::contradiction::{CompositeContradictionCheck, ContradictionCheck};
use crate::text::{content_tokens, overlap_ratio, shares_number};

/// Lookup of a document's units by id
pub struct UnitIndex<'a> {
    by_id: HashMap<&'a str, &'a Unit>,
}

impl<'a> UnitIndex<'a> {
    pub fn new(units: &'a [Unit]) -> Self {
        Self {
            by_id: units.iter().map(|u| (u.unit_id.as_str(), u)).collect(),
        }
    }

    pub fn get(&self, unit_id: &str) -> Option<&'a Unit> {
        self.by_id.get(unit_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Why a citation failed to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationProblem {
    UnknownUnit,
    PageMismatch { actual: u32 },
}

/// Validated claims plus human-readable issues, in claim order
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub claims: Vec<ValidatedClaim>,
    pub issues: Vec<String>,
}

impl ValidationOutcome {
    pub fn supported(&self) -> impl Iterator<Item = &ValidatedClaim> {
        self.claims.iter().filter(|c| c.is_supported())
    }

    pub fn supported_count(&self) -> usize {
        self.supported().count()
    }
}

#[derive(Clone)]
pub struct CitationValidator {
    min_overlap: f64,
    contradiction: Arc<dyn ContradictionCheck>,
}

impl CitationValidator {
    pub fn new(min_overlap: f64, contradiction: Arc<dyn ContradictionCheck>) -> Self {
        Self {
            min_overlap,
            contradiction,
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(
            config.min_overlap,
            Arc::new(CompositeContradictionCheck::from_config(config)),
        )
    }

    /// The contradiction capability, shared with conflict detection
    pub fn contradiction_check(&self) -> Arc<dyn ContradictionCheck> {
        Arc::clone(&self.contradiction)
    }

    pub fn resolve(&self, citation: &Citation, units: &UnitIndex<'_>) -> Result<(), CitationProblem> {
        match units.get(&citation.unit_id) {
            None => Err(CitationProblem::UnknownUnit),
            Some(unit) if unit.page_number != citation.page_number => {
                Err(CitationProblem::PageMismatch {
                    actual: unit.page_number,
                })
            }
            Some(_) => Ok(()),
        }
    }

    /// Overlap of at least `min_overlap`, or a shared figure
    pub fn supports(&self, claim_text: &str, unit_text: &str) -> bool {
        let claim_tokens = content_tokens(claim_text);
        if claim_tokens.is_empty() {
            return false;
        }
        let unit_tokens = content_tokens(unit_text);
        overlap_ratio(&claim_tokens, &unit_tokens) >= self.min_overlap
            || shares_number(claim_text, unit_text)
    }

    pub fn contradicts(&self, claim_text: &str, unit_text: &str) -> bool {
        self.contradiction.contradicts(claim_text, unit_text)
    }

    pub fn validate(&self, claim: &Claim, units: &UnitIndex<'_>) -> ValidatedClaim {
        self.validate_with_issues(0, claim, units).0
    }

    /// Validate one claim; `position` numbers the issue strings (1-based)
    pub fn validate_with_issues(
        &self,
        position: usize,
        claim: &Claim,
        units: &UnitIndex<'_>,
    ) -> (ValidatedClaim, Vec<String>) {
        let mut issues = Vec::new();
        let label = format!("claim_{}", position);

        if claim.claimed_citations.is_empty() {
            issues.push(format!("{}_missing_citations", label));
        }

        let mut valid_citations = Vec::new();
        for citation in &claim.claimed_citations {
            match self.resolve(citation, units) {
                Ok(()) => valid_citations.push(citation.clone()),
                Err(CitationProblem::UnknownUnit) => {
                    issues.push(format!("{}_unknown_unit:{}", label, citation.unit_id));
                }
                Err(CitationProblem::PageMismatch { .. }) => issues.push(format!(
                    "{}_page_mismatch:{}@{}",
                    label, citation.unit_id, citation.page_number
                )),
            }
        }

        let status = self.status(&claim.text, &valid_citations, units);
        match status {
            SupportStatus::Supported => {}
            SupportStatus::Unsupported => issues.push(format!("{}_unsupported", label)),
            SupportStatus::Contradicted => issues.push(format!("{}_contradicted", label)),
        }

        debug!(
            claimed = claim.claimed_citations.len(),
            valid = valid_citations.len(),
            status = status.as_str(),
            "Validated claim"
        );

        let validated = ValidatedClaim {
            text: claim.text.clone(),
            claimed_citations: claim.claimed_citations.clone(),
            section_id: claim.section_id.clone(),
            valid_citations,
            support_status: status,
        };
        (validated, issues)
    }

    /// Validate claims in order
    pub fn validate_all(&self, claims: &[Claim], units: &UnitIndex<'_>) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        for (i, claim) in claims.iter().enumerate() {
            let (validated, issues) = self.validate_with_issues(i + 1, claim, units);
            outcome.claims.push(validated);
            outcome.issues.extend(issues);
        }
        outcome
    }

    /// Supported if any cited unit supports the claim without contradicting
    /// it; otherwise contradicted if any cited unit contradicts it.
    fn status(&self, text: &str, valid: &[Citation], units: &UnitIndex<'_>) -> SupportStatus {
        let mut contradicted = false;

        for citation in valid {
            let Some(unit) = units.get(&citation.unit_id) else {
                continue;
            };
            let conflict = self.contradicts(text, &unit.text);
            if !conflict && self.supports(text, &unit.text) {
                return SupportStatus::Supported;
            }
            contradicted |= conflict;
        }

        if contradicted {
            SupportStatus::Contradicted
        } else {
            SupportStatus::Unsupported
        }
    }
}

impl Default for CitationValidator {
    fn default() -> Self {
        Self::from_config(&crate::config::EngineConfig::default().validation)
    }
}
