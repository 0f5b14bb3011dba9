//! Interaction classification for Q&A
//!
//! Routing happens in a fixed priority order before generation:
//!
//! 1. clarification (broad or ambiguous question, short-circuits generation)
//! 2. scenario (hypothetical situation trigger phrase)
//! 3. section_detail (detail intent plus a canonical section, or the
//!    section's full name)
//! 4. normal
//!
//! After generation and validation, [`InteractionClassifier::finalize`] may
//! reclassify to `not_found` (no evidence) or `conflict` (supported claims
//! from different pages that contradict each other).

use std::sync::Arc;

use policy_types::{AnswerType, ValidatedClaim};
use regex::Regex;
use tracing::debug;

use crate::config::{ClassifierConfig, ScenarioType};
use crate::contradiction::ContradictionCheck;
use crate::error::ConfigError;
use crate::sections::CanonicalSection;
use crate::text::contains_term;

/// Pre-generation routing decision
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub answer_type: AnswerType,
    pub section: Option<CanonicalSection>,
    pub scenario_type: Option<String>,
}

impl Route {
    fn new(answer_type: AnswerType) -> Self {
        Self {
            answer_type,
            section: None,
            scenario_type: None,
        }
    }

    pub fn is_clarification(&self) -> bool {
        self.answer_type == AnswerType::Clarification
    }
}

pub struct InteractionClassifier {
    clarification: Vec<Regex>,
    detail_intent: Vec<Regex>,
    scenario_triggers: Vec<String>,
    scenario_types: Vec<ScenarioType>,
    default_scenario_type: String,
    similarity_floor: f64,
    contradiction: Arc<dyn ContradictionCheck>,
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::Pattern {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

impl InteractionClassifier {
    pub fn new(
        config: &ClassifierConfig,
        similarity_floor: f64,
        contradiction: Arc<dyn ContradictionCheck>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            clarification: compile(&config.clarification_patterns)?,
            detail_intent: compile(&config.detail_intent_patterns)?,
            scenario_triggers: config
                .scenario_triggers
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            scenario_types: config.scenario_types.clone(),
            default_scenario_type: config.default_scenario_type.clone(),
            similarity_floor,
            contradiction,
        })
    }

    pub fn route(&self, question: &str) -> Route {
        let q = question.trim().to_lowercase();

        let route = if q.is_empty() || self.clarification.iter().any(|re| re.is_match(&q)) {
            Route::new(AnswerType::Clarification)
        } else if self.scenario_triggers.iter().any(|t| q.contains(t.as_str())) {
            Route {
                scenario_type: Some(self.scenario_type(&q)),
                ..Route::new(AnswerType::Scenario)
            }
        } else if let Some(section) = self.detail_section(&q) {
            Route {
                section: Some(section),
                ..Route::new(AnswerType::SectionDetail)
            }
        } else {
            Route::new(AnswerType::Normal)
        };

        debug!(answer_type = route.answer_type.as_str(), "Routed question");
        route
    }

    /// First configured scenario type with a keyword in the question
    pub fn scenario_type(&self, question: &str) -> String {
        let q = question.to_lowercase();
        self.scenario_types
            .iter()
            .find(|st| st.keywords.iter().any(|k| contains_term(&q, k)))
            .map(|st| st.name.clone())
            .unwrap_or_else(|| self.default_scenario_type.clone())
    }

    fn detail_section(&self, q: &str) -> Option<CanonicalSection> {
        if self.detail_intent.iter().any(|re| re.is_match(q)) {
            if let Some(section) = CanonicalSection::mentioned_in(q) {
                return Some(section);
            }
        }
        CanonicalSection::ALL.into_iter().find(|s| s.named_in(q))
    }

    /// Post-generation answer type.
    ///
    /// `retrieval_strength` is the best similarity among retrieved units,
    /// `None` when nothing was retrieved.
    pub fn finalize(
        &self,
        route: &Route,
        claims: &[ValidatedClaim],
        retrieval_strength: Option<f64>,
    ) -> AnswerType {
        if route.is_clarification() {
            return AnswerType::Clarification;
        }
        if !self.has_evidence(retrieval_strength) || !claims.iter().any(|c| c.is_supported()) {
            return AnswerType::NotFound;
        }
        if self.has_conflict(claims) {
            return AnswerType::Conflict;
        }
        route.answer_type
    }

    pub fn has_evidence(&self, retrieval_strength: Option<f64>) -> bool {
        matches!(retrieval_strength, Some(s) if s >= self.similarity_floor)
    }

    /// Two supported claims citing different pages whose texts contradict
    pub fn has_conflict(&self, claims: &[ValidatedClaim]) -> bool {
        let supported: Vec<&ValidatedClaim> = claims.iter().filter(|c| c.is_supported()).collect();

        for (i, a) in supported.iter().enumerate() {
            for b in &supported[i + 1..] {
                if a.cited_pages() == b.cited_pages() {
                    continue;
                }
                if self.contradiction.contradicts(&a.text, &b.text)
                    || self.contradiction.contradicts(&b.text, &a.text)
                {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::contradiction::CompositeContradictionCheck;
    use policy_types::{Citation, SupportStatus};

    fn classifier() -> InteractionClassifier {
        let config = EngineConfig::default();
        InteractionClassifier::new(
            &config.classifier,
            config.retrieval.similarity_floor,
            Arc::new(CompositeContradictionCheck::from_config(&config.validation)),
        )
        .unwrap()
    }

    fn supported(text: &str, page: u32) -> ValidatedClaim {
        let cites = vec![Citation::new(format!("c_{}_0", page), page)];
        ValidatedClaim {
            text: text.to_string(),
            claimed_citations: cites.clone(),
            section_id: None,
            valid_citations: cites,
            support_status: SupportStatus::Supported,
        }
    }

    #[test]
    fn test_broad_question_needs_clarification() {
        let c = classifier();
        assert_eq!(c.route("What is covered?").answer_type, AnswerType::Clarification);
        assert_eq!(c.route("what's covered").answer_type, AnswerType::Clarification);
        assert_eq!(c.route("   ").answer_type, AnswerType::Clarification);
        assert_eq!(
            c.route("Is physical therapy covered?").answer_type,
            AnswerType::Normal
        );
    }

    #[test]
    fn test_scenario_routing_and_type() {
        let c = classifier();
        let route = c.route("What would happen if I go to the emergency room at night?");
        assert_eq!(route.answer_type, AnswerType::Scenario);
        assert_eq!(route.scenario_type.as_deref(), Some("ER visit"));

        let route = c.route("Walk me through a prescription refill");
        assert_eq!(route.scenario_type.as_deref(), Some("Prescription fill"));

        let route = c.route("Give me an example scenario");
        assert_eq!(route.scenario_type.as_deref(), Some("General"));
    }

    #[test]
    fn test_section_detail_routing() {
        let c = classifier();
        let route = c.route("Tell me more about the exclusions");
        assert_eq!(route.answer_type, AnswerType::SectionDetail);
        assert_eq!(route.section, Some(CanonicalSection::ExclusionsLimitations));

        let route = c.route("Give me a detailed summary of cost sharing");
        assert_eq!(route.section, Some(CanonicalSection::CostSummary));

        // Full section name without intent phrase
        let route = c.route("What does the Administrative Conditions part say?");
        assert_eq!(route.section, Some(CanonicalSection::AdministrativeConditions));

        // Intent phrase without a section stays normal
        assert_eq!(
            c.route("Tell me more about my copay").answer_type,
            AnswerType::Normal
        );
    }

    #[test]
    fn test_scenario_beats_section_detail() {
        let c = classifier();
        let route = c.route("Walk me through the cost summary in more detail");
        assert_eq!(route.answer_type, AnswerType::Scenario);
    }

    #[test]
    fn test_finalize_not_found_without_evidence() {
        let c = classifier();
        let route = c.route("What is my deductible?");
        let claims = vec![supported("Deductible is $500.", 2)];
        assert_eq!(c.finalize(&route, &claims, None), AnswerType::NotFound);
        assert_eq!(c.finalize(&route, &claims, Some(0.01)), AnswerType::NotFound);
        assert_eq!(c.finalize(&route, &[], Some(0.9)), AnswerType::NotFound);
        assert_eq!(c.finalize(&route, &claims, Some(0.9)), AnswerType::Normal);
    }

    #[test]
    fn test_finalize_conflict_across_pages() {
        let c = classifier();
        let route = c.route("What is my deductible?");
        let claims = vec![
            supported("The deductible is $500.", 2),
            supported("The deductible is $1,000.", 7),
        ];
        assert_eq!(c.finalize(&route, &claims, Some(0.9)), AnswerType::Conflict);

        // Same page: not a cross-page conflict
        let same_page = vec![
            supported("The deductible is $500.", 2),
            supported("The deductible is $1,000.", 2),
        ];
        assert_eq!(c.finalize(&route, &same_page, Some(0.9)), AnswerType::Normal);
    }

    #[test]
    fn test_clarification_survives_finalize() {
        let c = classifier();
        let route = c.route("What is covered?");
        assert_eq!(c.finalize(&route, &[], None), AnswerType::Clarification);
    }
}
