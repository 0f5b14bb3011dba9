//! Deterministic confidence scoring
//!
//! Confidence is a pure function of the answer type, the validated claims
//! and the retrieval strength (similarity of the best retrieved unit):
//!
//! - base = supported / total claims (0 with no claims)
//! - minus a fixed penalty per unsupported and per contradicted claim
//! - capped at `low_evidence_ceiling` when retrieval is weak or absent
//! - clamped to [0, 1]
//!
//! A `not_found` answer always scores `not_found_floor`.

use policy_types::{AnswerType, ConfidenceLevel, SupportStatus, ValidatedClaim};

use crate::config::ConfidenceConfig;

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    config: ConfidenceConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    pub fn score(
        &self,
        answer_type: AnswerType,
        claims: &[ValidatedClaim],
        retrieval_strength: Option<f64>,
    ) -> f64 {
        if answer_type == AnswerType::NotFound {
            return self.config.not_found_floor;
        }

        let total = claims.len();
        let count = |status: SupportStatus| claims.iter().filter(|c| c.support_status == status).count();
        let supported = count(SupportStatus::Supported);
        let unsupported = count(SupportStatus::Unsupported);
        let contradicted = count(SupportStatus::Contradicted);

        let base = if total == 0 {
            0.0
        } else {
            supported as f64 / total as f64
        };

        let mut score = base
            - self.config.unsupported_penalty * unsupported as f64
            - self.config.contradicted_penalty * contradicted as f64;

        let weak_retrieval = match retrieval_strength {
            Some(strength) => strength < self.config.retrieval_floor,
            None => true,
        };
        if weak_retrieval {
            score = score.min(self.config.low_evidence_ceiling);
        }

        score.clamp(0.0, 1.0)
    }

    pub fn level(&self, confidence: f64) -> ConfidenceLevel {
        if confidence >= self.config.high_threshold {
            ConfidenceLevel::High
        } else if confidence >= self.config.medium_threshold {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(crate::config::EngineConfig::default().confidence)
    }
}
