//! Completeness: weighted checklist coverage across the canonical sections
//!
//! A checklist item is covered by a bullet of its section that has at least
//! one citation resolving in the document and mentions one of the item's
//! keywords. A section that states explicitly that its information was not
//! found counts as addressing every item.

use std::collections::BTreeMap;

use policy_types::{CompletenessReport, PolicySummary, SectionCoverage, SectionSummary};

use crate::config::EvaluationConfig;
use crate::sections::CanonicalSection;
use crate::text::contains_term;
use crate::validator::{CitationValidator, UnitIndex};

const NOT_FOUND_MARKER: &str = "not found";

/// Issues marking a section that failed rather than one the document lacks
const FAILED_SECTION_ISSUES: &[&str] = &["generation_failed", "no_supported_bullets"];

/// Returns the weighted score, the per-section report and the
/// `completeness:*` errors raised for malformed section data.
pub fn completeness(
    summary: &PolicySummary,
    units: &UnitIndex<'_>,
    validator: &CitationValidator,
    config: &EvaluationConfig,
) -> (f64, CompletenessReport, Vec<String>) {
    let mut errors = Vec::new();
    let mut by_section: BTreeMap<CanonicalSection, &SectionSummary> = BTreeMap::new();

    for section in &summary.sections {
        let resolved = CanonicalSection::parse(&section.section_id)
            .or_else(|| CanonicalSection::parse(&section.section_name));
        match resolved {
            None => errors.push(format!("completeness:unknown_section:{}", section.section_name)),
            Some(canonical) if by_section.contains_key(&canonical) => {
                errors.push(format!("completeness:duplicate_section:{}", section.section_name))
            }
            Some(canonical) => {
                by_section.insert(canonical, section);
            }
        }
    }

    let mut report = CompletenessReport::default();
    let mut score = 0.0;

    for canonical in CanonicalSection::ALL {
        let weight = config.weight(canonical);
        let mut covered = Vec::new();
        let mut missing = Vec::new();

        let section = by_section.get(&canonical).copied();
        let states_not_found = section.is_some_and(states_not_found);

        for item in config.items_for(canonical) {
            let hit = states_not_found
                || section.is_some_and(|s| {
                    s.bullets.iter().any(|b| {
                        let grounded = b
                            .claimed_citations
                            .iter()
                            .any(|c| validator.resolve(c, units).is_ok());
                        let text = b.text.to_lowercase();
                        grounded && item.keywords.iter().any(|k| contains_term(&text, k))
                    })
                });
            if hit {
                covered.push(item.id.clone());
            } else {
                missing.push(item.id.clone());
            }
        }

        let total = covered.len() + missing.len();
        let section_score = if total == 0 {
            0.0
        } else {
            covered.len() as f64 / total as f64
        };
        score += weight * section_score;

        report.sections.push(SectionCoverage {
            section_id: canonical.id().to_string(),
            weight,
            score: section_score,
            covered,
            missing,
        });
    }

    (score.clamp(0.0, 1.0), report, errors)
}

/// Whether the section explicitly says the document does not cover it
fn states_not_found(section: &SectionSummary) -> bool {
    if section
        .validation_issues
        .iter()
        .any(|issue| FAILED_SECTION_ISSUES.contains(&issue.as_str()))
    {
        return false;
    }
    if section.bullets.is_empty() {
        return section.not_found_message.is_some();
    }
    section
        .bullets
        .iter()
        .any(|b| b.text.to_lowercase().contains(NOT_FOUND_MARKER))
}
