//! Faithfulness: share of summary bullets grounded in their cited units

use policy_types::{BulletFinding, Claim, FaithfulnessReport, PolicySummary, SupportStatus};

use crate::text::preview;
use crate::validator::{CitationValidator, UnitIndex};

const PREVIEW_CHARS: usize = 80;

/// Returns the score (0 with no bullets) and the per-bullet report
pub fn faithfulness(
    summary: &PolicySummary,
    units: &UnitIndex<'_>,
    validator: &CitationValidator,
) -> (f64, FaithfulnessReport) {
    let mut report = FaithfulnessReport::default();

    for section in summary.sections.iter().filter(|s| s.present) {
        for bullet in &section.bullets {
            let claim = Claim::new(bullet.text.clone(), bullet.claimed_citations.clone());
            let validated = validator.validate(&claim, units);

            let reason = match validated.support_status {
                SupportStatus::Supported => "supported",
                SupportStatus::Contradicted => "contradicted",
                SupportStatus::Unsupported if claim.claimed_citations.is_empty() => "no_citations",
                SupportStatus::Unsupported if validated.valid_citations.is_empty() => "invalid_citations",
                SupportStatus::Unsupported => "low_overlap",
            };

            report.total_bullets += 1;
            match validated.support_status {
                SupportStatus::Supported => report.supported += 1,
                SupportStatus::Unsupported => report.unsupported += 1,
                SupportStatus::Contradicted => report.contradicted += 1,
            }
            report.details.push(BulletFinding {
                section_id: section.section_id.clone(),
                text_preview: preview(&bullet.text, PREVIEW_CHARS),
                status: validated.support_status,
                reason: reason.to_string(),
            });
        }
    }

    if report.total_bullets == 0 {
        return (0.0, report);
    }

    let total = report.total_bullets as f64;
    report.hallucination_rate = report.unsupported as f64 / total;
    report.contradiction_rate = report.contradicted as f64 / total;
    (report.supported as f64 / total, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::tests::{bullet, section, summary, units};

    #[test]
    fn test_counts_and_rates() {
        let units = units();
        let index = UnitIndex::new(&units);
        let s = summary(vec![section(
            "cost_summary",
            vec![
                bullet("The annual deductible is $500.", &[("c_2_0", 2)]),
                bullet("The annual deductible is $900.", &[("c_2_0", 2)]),
                bullet("Dental implants are fully reimbursed.", &[("c_2_0", 2)]),
                bullet("The annual deductible is $500.", &[("c_2_0", 5)]),
            ],
        )]);

        let (score, report) = faithfulness(&s, &index, &CitationValidator::default());
        assert_eq!(report.total_bullets, 4);
        assert_eq!(report.supported, 1);
        assert_eq!(report.contradicted, 1);
        assert_eq!(report.unsupported, 2);
        assert!((score - 0.25).abs() < 1e-9);
        assert!((report.hallucination_rate - 0.5).abs() < 1e-9);
        assert!((report.contradiction_rate - 0.25).abs() < 1e-9);

        let reasons: Vec<&str> = report.details.iter().map(|d| d.reason.as_str()).collect();
        assert_eq!(reasons, vec!["supported", "contradicted", "low_overlap", "invalid_citations"]);
    }

    #[test]
    fn test_empty_summary_scores_zero() {
        let units = units();
        let index = UnitIndex::new(&units);
        let (score, report) = faithfulness(&summary(vec![]), &index, &CitationValidator::default());
        assert_eq!(score, 0.0);
        assert_eq!(report.total_bullets, 0);
    }
}
