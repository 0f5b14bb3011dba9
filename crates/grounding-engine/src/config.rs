//! Engine configuration
//!
//! All tunable constants (chunk bounds, thresholds, penalties, keyword lists,
//! checklists, section weights) live in one immutable [`EngineConfig`]. The
//! built-in values ship as `config/default.toml`; a user file is merged over
//! them table by table and the result is validated before use.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sections::CanonicalSection;

const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Tolerance when checking that section weights sum to 1.0
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

lazy_static! {
    static ref BUILTIN: EngineConfig = EngineConfig::from_str(DEFAULT_CONFIG_TOML)
        .expect("built-in engine configuration must be valid");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub chunking: ChunkingConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
    pub validation: ValidationConfig,
    pub confidence: ConfidenceConfig,
    pub summary: SummaryConfig,
    pub classifier: ClassifierConfig,
    pub preventive: PreventiveConfig,
    pub evaluation: EvaluationConfig,
    /// Canonical term -> synonyms replaced by it in generated text
    pub terminology: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub min_tokens: usize,
    pub target_tokens: usize,
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub min_policy_keywords: usize,
    pub policy_sample_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub qa_top_k: usize,
    pub scenario_top_k: usize,
    pub section_top_k_per_query: usize,
    pub section_max_units: usize,
    pub similarity_floor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub min_overlap: f64,
    pub anchor_window: usize,
    pub negation_window: usize,
    pub min_topic_overlap: f64,
    pub anchors: Vec<String>,
    pub negation_cues: Vec<String>,
    pub predicates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    pub unsupported_penalty: f64,
    pub contradicted_penalty: f64,
    pub retrieval_floor: f64,
    pub low_evidence_ceiling: f64,
    pub not_found_floor: f64,
    pub high_threshold: f64,
    pub medium_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub standard_min_bullets: usize,
    pub standard_max_bullets: usize,
    pub detailed_min_bullets: usize,
    pub detailed_max_bullets: usize,
    pub not_found_message: String,
    pub disclaimer: String,
    pub qa_disclaimer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioType {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub clarification_patterns: Vec<String>,
    pub clarification_prompt: String,
    pub detail_intent_patterns: Vec<String>,
    pub scenario_triggers: Vec<String>,
    pub scenario_types: Vec<ScenarioType>,
    pub default_scenario_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreventiveConfig {
    pub keywords: Vec<String>,
    pub policy_label: String,
    pub guidance_label: String,
    pub guidance: String,
    pub follow_up_questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub section: CanonicalSection,
    pub id: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub jargon_terms: Vec<String>,
    /// Section id -> completeness weight
    pub weights: BTreeMap<String, f64>,
    pub checklist: Vec<ChecklistItem>,
}

impl EvaluationConfig {
    pub fn weight(&self, section: CanonicalSection) -> f64 {
        self.weights.get(section.id()).copied().unwrap_or(0.0)
    }

    pub fn items_for(&self, section: CanonicalSection) -> impl Iterator<Item = &ChecklistItem> {
        self.checklist.iter().filter(move |item| item.section == section)
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, merged over the built-in values
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config: {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("Invalid engine config: {}", path.display()))
    }

    /// Parse configuration from a TOML string, merged over the built-in values
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or the merged configuration
    /// fails validation.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let overlay: toml::Value = toml::from_str(s)?;
        let mut merged: toml::Value = toml::from_str(DEFAULT_CONFIG_TOML)?;
        merge_tables(&mut merged, overlay);

        let config = merged.try_into::<EngineConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.chunking;
        if c.max_tokens == 0 || c.min_tokens > c.target_tokens || c.target_tokens > c.max_tokens {
            return Err(ConfigError::ChunkBounds {
                min: c.min_tokens,
                target: c.target_tokens,
                max: c.max_tokens,
            });
        }
        if c.overlap_tokens >= c.max_tokens {
            return Err(ConfigError::OverlapTooLarge {
                overlap: c.overlap_tokens,
                max: c.max_tokens,
            });
        }

        let conf = &self.confidence;
        for (name, value) in [
            ("validation.min_overlap", self.validation.min_overlap),
            ("validation.min_topic_overlap", self.validation.min_topic_overlap),
            ("retrieval.similarity_floor", self.retrieval.similarity_floor),
            ("confidence.unsupported_penalty", conf.unsupported_penalty),
            ("confidence.contradicted_penalty", conf.contradicted_penalty),
            ("confidence.retrieval_floor", conf.retrieval_floor),
            ("confidence.low_evidence_ceiling", conf.low_evidence_ceiling),
            ("confidence.not_found_floor", conf.not_found_floor),
            ("confidence.high_threshold", conf.high_threshold),
            ("confidence.medium_threshold", conf.medium_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field: name.to_string(),
                    value,
                });
            }
        }
        if conf.medium_threshold > conf.high_threshold {
            return Err(ConfigError::OutOfRange {
                field: "confidence.medium_threshold".to_string(),
                value: conf.medium_threshold,
            });
        }

        let s = &self.summary;
        if s.standard_min_bullets > s.standard_max_bullets
            || s.detailed_min_bullets > s.detailed_max_bullets
            || s.standard_max_bullets == 0
        {
            return Err(ConfigError::BulletBounds);
        }

        let eval = &self.evaluation;
        for key in eval.weights.keys() {
            if CanonicalSection::parse(key).map(|s| s.id()) != Some(key.as_str()) {
                return Err(ConfigError::UnknownSection(key.clone()));
            }
        }
        for section in CanonicalSection::ALL {
            if !eval.weights.contains_key(section.id()) {
                return Err(ConfigError::MissingWeight(section.id().to_string()));
            }
            if eval.items_for(section).next().is_none() {
                return Err(ConfigError::EmptyChecklist(section.id().to_string()));
            }
        }
        for (section, &value) in &eval.weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    section: section.clone(),
                    value,
                });
            }
        }
        let sum: f64 = eval.weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum(sum));
        }
        for item in &eval.checklist {
            if item.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(ConfigError::EmptyChecklistItem(item.id.clone()));
            }
        }

        for pattern in self
            .classifier
            .clarification_patterns
            .iter()
            .chain(&self.classifier.detail_intent_patterns)
        {
            Regex::new(pattern).map_err(|e| ConfigError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

/// Recursively overlays `overlay` onto `base`. Tables merge key by key;
/// every other value (including arrays) replaces the base value.
fn merge_tables(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_tables(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
