use policy_types::{AnswerEnvelope, AnswerType, Claim, QaResponse, ValidatedClaim};
use tracing::{debug, info};

use super::Engine;
use crate::classifier::Route;
use crate::collaborators::{GenerationRequest, RetrievedUnit};
use crate::config::PreventiveConfig;
use crate::error::{PipelineError, Result};
use crate::retrieval::{retrieval_strength, retrieve_for_section};
use crate::sections::CanonicalSection;
use crate::text::contains_term;
use crate::validator::UnitIndex;

const UNVERIFIED: &str = "(not verified in document)";
const CONFLICT_PREFIX: &str = "The document contains conflicting information on this point:";

/// `(p. N)` for each distinct page the claim validly cites
pub fn page_markers(claim: &ValidatedClaim) -> String {
    claim
        .cited_pages()
        .iter()
        .map(|p| format!("(p. {})", p))
        .collect::<Vec<_>>()
        .join(" ")
}

fn display_sentence(claim: &ValidatedClaim) -> String {
    let text = claim.text.trim();
    if !claim.is_supported() {
        return format!("{} {}", text, UNVERIFIED);
    }
    let markers = page_markers(claim);
    if markers.is_empty() {
        text.to_string()
    } else {
        format!("{} {}", text, markers)
    }
}

/// Display text for an answer with claims. Supported sentences carry page
/// markers; anything else is flagged as not verified.
pub fn render_answer(envelope: &AnswerEnvelope, section: Option<CanonicalSection>) -> String {
    let sentences: Vec<String> = envelope.claims.iter().map(display_sentence).collect();

    match envelope.answer_type {
        AnswerType::SectionDetail => {
            let title = section.map(|s| s.display_name()).unwrap_or("this section");
            let mut out = format!("Detailed overview of {}:", title);
            for s in &sentences {
                out.push_str("\n- ");
                out.push_str(s);
            }
            out
        }
        AnswerType::Scenario => sentences
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n"),
        AnswerType::Conflict => {
            let mut out = CONFLICT_PREFIX.to_string();
            for s in &sentences {
                out.push_str("\n- ");
                out.push_str(s);
            }
            out
        }
        _ => sentences.join(" "),
    }
}

fn is_preventive(question: &str, config: &PreventiveConfig) -> bool {
    let q = question.to_lowercase();
    config.keywords.iter().any(|k| contains_term(&q, k))
}

impl Engine {
    /// Answers a question about a stored document.
    ///
    /// Routing happens first; a clarification never reaches the generator.
    /// Weak retrieval short-circuits to `not_found`. Generated sentences are
    /// validated and kept, with anything unsupported flagged in the answer
    /// text.
    pub async fn answer(&self, doc_id: &str, question: &str) -> Result<QaResponse> {
        let record = self.load_document(doc_id).await?;
        let route = self.classifier.route(question);

        let mut response = QaResponse {
            doc_id: doc_id.to_string(),
            question: question.to_string(),
            answer: String::new(),
            envelope: AnswerEnvelope::clarification(0.0),
            confidence_level: self.scorer.level(0.0),
            disclaimer: self.config.summary.qa_disclaimer.clone(),
            validation_issues: Vec::new(),
            section_id: route.section.map(|s| s.id().to_string()),
            scenario_type: route.scenario_type.clone(),
            follow_up_questions: Vec::new(),
        };

        if route.is_clarification() {
            response.answer = self.config.classifier.clarification_prompt.clone();
            info!(doc_id, answer_type = "clarification", "Answered question");
            return Ok(response);
        }

        let units = self.retrieve_for_route(doc_id, question, &route).await?;
        let strength = retrieval_strength(&units);

        if !self.classifier.has_evidence(strength) {
            debug!(doc_id, ?strength, "No evidence above similarity floor");
            self.finish_not_found(&mut response);
            self.add_preventive_guidance(&mut response);
            info!(doc_id, answer_type = "not_found", "Answered question");
            return Ok(response);
        }

        let request = match (route.answer_type, route.section, route.scenario_type.as_deref()) {
            (AnswerType::SectionDetail, Some(section), _) => GenerationRequest::section_detail(
                question,
                section,
                units,
                self.config.summary.detailed_max_bullets,
            ),
            (AnswerType::Scenario, _, Some(scenario_type)) => {
                GenerationRequest::scenario(question, scenario_type, units)
            }
            _ => GenerationRequest::qa(question, units),
        };

        let claims = self
            .generator
            .generate(&request)
            .await
            .map_err(PipelineError::Generation)?;
        let claims: Vec<Claim> = claims
            .into_iter()
            .map(|claim| Claim {
                text: self.terms.normalize(&claim.text),
                section_id: claim.section_id.or_else(|| response.section_id.clone()),
                ..claim
            })
            .collect();

        let index = UnitIndex::new(&record.units);
        let outcome = self.validator.validate_all(&claims, &index);
        response.validation_issues = outcome.issues;

        let answer_type = self.classifier.finalize(&route, &outcome.claims, strength);
        if answer_type == AnswerType::NotFound {
            self.finish_not_found(&mut response);
        } else {
            let confidence = self.scorer.score(answer_type, &outcome.claims, strength);
            response.envelope = AnswerEnvelope::new(answer_type, outcome.claims, confidence);
            response.confidence_level = self.scorer.level(confidence);
            response.answer = render_answer(&response.envelope, route.section);
        }
        self.add_preventive_guidance(&mut response);

        info!(
            doc_id,
            answer_type = response.envelope.answer_type.as_str(),
            confidence = response.envelope.confidence,
            claims = response.envelope.claims.len(),
            "Answered question"
        );
        Ok(response)
    }

    async fn retrieve_for_route(
        &self,
        doc_id: &str,
        question: &str,
        route: &Route,
    ) -> Result<Vec<RetrievedUnit>> {
        let retrieval = &self.config.retrieval;
        let units = match (route.answer_type, route.section, route.scenario_type.as_deref()) {
            (AnswerType::SectionDetail, Some(section), _) => {
                retrieve_for_section(
                    self.retriever.as_ref(),
                    doc_id,
                    section,
                    retrieval.section_top_k_per_query,
                    retrieval.section_max_units,
                )
                .await
            }
            (AnswerType::Scenario, _, Some(scenario_type)) => {
                let query = format!("{} deductible copay coinsurance out of pocket", scenario_type);
                self.retriever
                    .retrieve(doc_id, &query, retrieval.scenario_top_k)
                    .await
            }
            _ => {
                self.retriever
                    .retrieve(doc_id, question, retrieval.qa_top_k)
                    .await
            }
        };
        units.map_err(PipelineError::Retrieval)
    }

    fn finish_not_found(&self, response: &mut QaResponse) {
        let floor = self.scorer.config().not_found_floor;
        response.envelope = AnswerEnvelope::not_found(floor);
        response.confidence_level = self.scorer.level(floor);
        response.answer = self.config.summary.not_found_message.clone();
    }

    /// Preventive-care questions that the document cannot answer with
    /// confidence get generic guidance, labelled as such.
    fn add_preventive_guidance(&self, response: &mut QaResponse) {
        let preventive = &self.config.preventive;
        if !is_preventive(&response.question, preventive) {
            return;
        }
        let weak = matches!(
            response.envelope.answer_type,
            AnswerType::NotFound | AnswerType::Conflict
        ) || response.envelope.confidence < self.scorer.config().medium_threshold;
        if !weak {
            return;
        }

        response.answer = format!(
            "{}\n{}\n\n{}\n{}",
            preventive.policy_label, response.answer, preventive.guidance_label, preventive.guidance
        );
        response.follow_up_questions = preventive.follow_up_questions.clone();
    }
}
