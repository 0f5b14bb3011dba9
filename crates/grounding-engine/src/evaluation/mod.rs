//! Summary evaluation
//!
//! [`Evaluator`] runs faithfulness, completeness and simplicity over a
//! finished summary and the document it was generated from. The metrics are
//! independent: a problem with one is recorded in `errors` as
//! `"<metric>:<reason>"` and never stops the others.

pub mod completeness;
pub mod faithfulness;
pub mod simplicity;

use std::collections::HashSet;

use chrono::Utc;
use policy_types::{EvaluationReport, Page, PolicySummary, Unit};
use tracing::{debug, info};

use crate::config::EvaluationConfig;
use crate::validator::{CitationValidator, UnitIndex};

pub use completeness::completeness;
pub use faithfulness::faithfulness;
pub use simplicity::{readability, simplicity};

pub struct Evaluator {
    config: EvaluationConfig,
    jargon: HashSet<String>,
    validator: CitationValidator,
}

impl Evaluator {
    pub fn new(config: EvaluationConfig, validator: CitationValidator) -> Self {
        let jargon = config.jargon_terms.iter().map(|t| t.to_lowercase()).collect();
        Self {
            config,
            jargon,
            validator,
        }
    }

    /// Scores `summary` against the document's pages and units. A missing
    /// summary, or one without bullets, scores 0 on every metric.
    pub fn evaluate(
        &self,
        doc_id: &str,
        summary: Option<&PolicySummary>,
        pages: &[Page],
        units: &[Unit],
    ) -> EvaluationReport {
        let mut report = EvaluationReport {
            doc_id: doc_id.to_string(),
            evaluated_at: Utc::now(),
            ..Default::default()
        };

        let summary = match summary {
            Some(s) if s.bullet_count() > 0 => s,
            Some(_) => {
                report.errors = missing_summary_errors("summary_empty");
                info!(doc_id, "Evaluated empty summary");
                return report;
            }
            None => {
                report.errors = missing_summary_errors("summary_missing");
                info!(doc_id, "Evaluated missing summary");
                return report;
            }
        };

        let index = UnitIndex::new(units);
        if index.is_empty() {
            report.errors.push("faithfulness:units_missing".to_string());
        }

        let (score, detail) = faithfulness(summary, &index, &self.validator);
        report.faithfulness_score = score;
        report.faithfulness = detail;
        if report.faithfulness.total_bullets == 0 {
            // Only bullets of sections marked not present
            report.errors.push("faithfulness:no_present_bullets".to_string());
        }

        let (score, detail, errors) = completeness(summary, &index, &self.validator, &self.config);
        report.completeness_score = score;
        report.completeness = detail;
        report.errors.extend(errors);

        let original: String = pages
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if original.is_empty() {
            report.errors.push("simplicity:pages_missing".to_string());
        } else {
            let text = simplicity::summary_text(
                summary
                    .sections
                    .iter()
                    .flat_map(|s| s.bullets.iter().map(|b| b.text.as_str())),
            );
            let (score, detail) = simplicity(&original, &text, &self.jargon);
            report.simplicity_score = score;
            report.simplicity = detail;
        }

        debug!(doc_id, errors = report.errors.len(), "Evaluation details");
        info!(
            doc_id,
            faithfulness = report.faithfulness_score,
            completeness = report.completeness_score,
            simplicity = report.simplicity_score,
            "Evaluated summary"
        );
        report
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        let config = crate::config::EngineConfig::default();
        Self::new(config.evaluation, CitationValidator::from_config(&config.validation))
    }
}

fn missing_summary_errors(reason: &str) -> Vec<String> {
    ["faithfulness", "completeness", "simplicity"]
        .iter()
        .map(|metric| format!("{}:{}", metric, reason))
        .collect()
}
