pub mod evaluation;
pub mod summary;
pub mod types;

pub use evaluation::{
    BulletFinding, CompletenessReport, EvaluationReport, FaithfulnessReport, ReadabilityStats,
    SectionCoverage, SimplicityReport,
};
pub use summary::{DocMetadata, PolicySummary, SectionSummary};
pub use types::{
    dedup_citations, AnswerEnvelope, AnswerType, Citation, Claim, ConfidenceLevel,
    DocumentRecord, Page, QaResponse, SupportStatus, Unit, ValidatedClaim,
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn claim(text: &str, citations: &[(&str, u32)], status: SupportStatus) -> ValidatedClaim {
        let cites: Vec<Citation> = citations
            .iter()
            .map(|(id, page)| Citation::new(*id, *page))
            .collect();
        ValidatedClaim {
            text: text.to_string(),
            claimed_citations: cites.clone(),
            section_id: None,
            valid_citations: cites,
            support_status: status,
        }
    }

    #[test]
    fn test_claim_new_dedups_citations_in_order() {
        let c = Claim::new(
            "Deductible is $500",
            vec![
                Citation::new("c_2_0", 2),
                Citation::new("c_1_0", 1),
                Citation::new("c_2_0", 2),
            ],
        );
        assert_eq!(
            c.claimed_citations,
            vec![Citation::new("c_2_0", 2), Citation::new("c_1_0", 1)]
        );
    }

    #[test]
    fn test_envelope_citations_are_union_of_valid_citations() {
        let env = AnswerEnvelope::new(
            AnswerType::Normal,
            vec![
                claim("a", &[("c_1_0", 1), ("c_3_1", 3)], SupportStatus::Supported),
                claim("b", &[("c_3_1", 3), ("c_4_0", 4)], SupportStatus::Supported),
            ],
            0.8,
        );
        assert_eq!(
            env.citations,
            vec![
                Citation::new("c_1_0", 1),
                Citation::new("c_3_1", 3),
                Citation::new("c_4_0", 4),
            ]
        );
    }

    #[test]
    fn test_not_found_envelope_is_empty() {
        let env = AnswerEnvelope::not_found(0.05);
        assert_eq!(env.answer_type, AnswerType::NotFound);
        assert!(env.claims.is_empty());
        assert!(env.citations.is_empty());
        assert_eq!(env.confidence, 0.05);
    }

    #[test]
    fn test_enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&AnswerType::SectionDetail).unwrap(),
            "\"section_detail\""
        );
        assert_eq!(
            serde_json::to_string(&AnswerType::NotFound).unwrap(),
            "\"not_found\""
        );
        assert_eq!(
            serde_json::to_string(&SupportStatus::Contradicted).unwrap(),
            "\"contradicted\""
        );
    }

    #[test]
    fn test_claim_deserializes_without_optional_fields() {
        let c: Claim = serde_json::from_str(r#"{"text": "Copay is $25"}"#).unwrap();
        assert!(c.claimed_citations.is_empty());
        assert!(c.section_id.is_none());
    }

    #[test]
    fn test_cited_pages_sorted_and_distinct() {
        let c = claim(
            "x",
            &[("c_4_0", 4), ("c_2_0", 2), ("c_4_1", 4)],
            SupportStatus::Supported,
        );
        assert_eq!(c.cited_pages(), vec![2, 4]);
    }
}
