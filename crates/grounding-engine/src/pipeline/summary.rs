use chrono::Utc;
use futures::future::try_join_all;
use policy_types::{AnswerType, Claim, DocMetadata, DocumentRecord, PolicySummary, SectionSummary};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::Engine;
use crate::collaborators::GenerationRequest;
use crate::config::SummaryConfig;
use crate::error::{PipelineError, Result};
use crate::retrieval::{retrieval_strength, retrieve_for_section};
use crate::sections::CanonicalSection;
use crate::validator::UnitIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    #[default]
    Standard,
    Detailed,
}

impl DetailLevel {
    /// (min, max) bullets per present section
    pub fn bullet_bounds(&self, config: &SummaryConfig) -> (usize, usize) {
        match self {
            DetailLevel::Standard => (config.standard_min_bullets, config.standard_max_bullets),
            DetailLevel::Detailed => (config.detailed_min_bullets, config.detailed_max_bullets),
        }
    }
}

/// Issues for a bullet count outside `[min, max]`
pub fn bullet_count_issues(count: usize, min: usize, max: usize) -> Vec<String> {
    if count > max {
        vec![format!("bullet_count_high: {} bullets (max {})", count, max)]
    } else if count < min {
        vec![format!("bullet_count_low: {} bullets (min {})", count, min)]
    } else {
        Vec::new()
    }
}

impl Engine {
    /// Generates, validates and persists a summary of all six sections.
    ///
    /// Only supported bullets are kept. A section with no relevant units, no
    /// supported bullets, or a failed generation call is reported as not
    /// present rather than failing the whole summary.
    pub async fn summarize(&self, doc_id: &str, detail: DetailLevel) -> Result<PolicySummary> {
        let record = self.load_document(doc_id).await?;

        let sections = try_join_all(
            CanonicalSection::ALL
                .into_iter()
                .map(|section| self.summarize_section(&record, section, detail)),
        )
        .await?;

        let summary = PolicySummary {
            metadata: DocMetadata {
                doc_id: record.doc_id.clone(),
                generated_at: Utc::now(),
                total_pages: record.page_count() as u32,
                source_name: record.source_name.clone(),
            },
            disclaimer: self.config.summary.disclaimer.clone(),
            sections,
        };

        self.store
            .put_summary(doc_id, &summary)
            .await
            .map_err(PipelineError::Store)?;

        info!(
            doc_id,
            present = summary.sections.iter().filter(|s| s.present).count(),
            bullets = summary.bullet_count(),
            "Generated summary"
        );
        Ok(summary)
    }

    async fn summarize_section(
        &self,
        record: &DocumentRecord,
        section: CanonicalSection,
        detail: DetailLevel,
    ) -> Result<SectionSummary> {
        let retrieval = &self.config.retrieval;
        let (min_bullets, max_bullets) = detail.bullet_bounds(&self.config.summary);

        let units = retrieve_for_section(
            self.retriever.as_ref(),
            &record.doc_id,
            section,
            retrieval.section_top_k_per_query,
            retrieval.section_max_units,
        )
        .await
        .map_err(PipelineError::Retrieval)?;

        let strength = retrieval_strength(&units);
        if !self.classifier.has_evidence(strength) {
            return Ok(self.missing_section(section, vec!["no_relevant_units".to_string()]));
        }

        let request = GenerationRequest::summary(section, units, max_bullets);
        let claims = match self.generator.generate(&request).await {
            Ok(claims) => claims,
            Err(e) => {
                warn!(doc_id = %record.doc_id, section = section.id(), error = %e, "Section generation failed");
                return Ok(self.missing_section(section, vec!["generation_failed".to_string()]));
            }
        };

        let claims: Vec<Claim> = claims
            .into_iter()
            .map(|claim| Claim {
                text: self.terms.normalize(&claim.text),
                section_id: Some(section.id().to_string()),
                ..claim
            })
            .collect();

        let index = UnitIndex::new(&record.units);
        let outcome = self.validator.validate_all(&claims, &index);
        let mut issues = outcome.issues.clone();

        let mut bullets: Vec<_> = outcome.supported().cloned().collect();
        debug!(
            section = section.id(),
            generated = outcome.claims.len(),
            supported = bullets.len(),
            "Validated section bullets"
        );
        if bullets.is_empty() {
            issues.push("no_supported_bullets".to_string());
            return Ok(self.missing_section(section, issues));
        }

        issues.extend(bullet_count_issues(bullets.len(), min_bullets, max_bullets));
        bullets.truncate(max_bullets);

        let confidence = self
            .scorer
            .score(AnswerType::Normal, &outcome.claims, strength);

        Ok(SectionSummary {
            section_id: section.id().to_string(),
            section_name: section.display_name().to_string(),
            present: true,
            bullets,
            not_found_message: None,
            confidence,
            confidence_level: self.scorer.level(confidence),
            validation_issues: issues,
        })
    }

    fn missing_section(&self, section: CanonicalSection, issues: Vec<String>) -> SectionSummary {
        let floor = self.scorer.config().not_found_floor;
        SectionSummary {
            validation_issues: issues,
            ..SectionSummary::not_found(
                section.id(),
                section.display_name(),
                self.config.summary.not_found_message.clone(),
                floor,
            )
        }
    }
}
