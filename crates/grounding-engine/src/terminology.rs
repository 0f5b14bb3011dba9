//! Canonical insurance terminology for generated text
//!
//! Synonyms are replaced by their canonical term in a single left-to-right
//! pass. Matching is case-insensitive and whole-phrase; longer synonyms win
//! over their prefixes. Double-quoted spans are copied through untouched so
//! quoted policy language is never rewritten.

use std::collections::{BTreeMap, HashMap};

use regex::{Captures, Regex};

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct TermNormalizer {
    /// `None` when the map has no usable synonyms
    pattern: Option<Regex>,
    canonical: HashMap<String, String>,
}

impl TermNormalizer {
    pub fn new(map: &BTreeMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let mut canonical = HashMap::new();
        for (term, synonyms) in map {
            for synonym in synonyms {
                let synonym = synonym.trim().to_lowercase();
                if !synonym.is_empty() {
                    canonical.entry(synonym).or_insert_with(|| term.clone());
                }
            }
        }

        if canonical.is_empty() {
            return Ok(Self {
                pattern: None,
                canonical,
            });
        }

        let mut synonyms: Vec<&String> = canonical.keys().collect();
        // Longest first, then alphabetical for a stable pattern
        synonyms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = synonyms
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let source = format!(r#"(?i)(?P<quoted>"[^"]*")|\b(?P<term>{})\b"#, alternation);
        let pattern = Regex::new(&source).map_err(|e| ConfigError::Pattern {
            pattern: source.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            pattern: Some(pattern),
            canonical,
        })
    }

    pub fn normalize(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };
        if text.trim().is_empty() {
            return text.to_string();
        }

        pattern
            .replace_all(text, |caps: &Captures<'_>| {
                if let Some(quoted) = caps.name("quoted") {
                    return quoted.as_str().to_string();
                }
                let matched = caps.name("term").map(|m| m.as_str()).unwrap_or_default();
                self.canonical
                    .get(&matched.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| matched.to_string())
            })
            .into_owned()
    }
}

impl Default for TermNormalizer {
    fn default() -> Self {
        Self {
            pattern: None,
            canonical: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn builtin() -> TermNormalizer {
        TermNormalizer::new(&EngineConfig::default().terminology).unwrap()
    }

    fn map(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_synonyms_become_canonical() {
        let n = builtin();
        let out = n.normalize("Your OOP max is $5000. The annual deductible applies first.");
        assert_eq!(out, "Your out-of-pocket maximum is $5000. The deductible applies first.");
        assert_eq!(n.normalize("Co-insurance is 20%."), "coinsurance is 20%.");
    }

    #[test]
    fn test_longest_synonym_wins() {
        let n = builtin();
        assert_eq!(
            n.normalize("The out of pocket maximum is $6,000."),
            "The out-of-pocket maximum is $6,000."
        );
    }

    #[test]
    fn test_whole_phrase_only() {
        let n = TermNormalizer::new(&map(&[("in-network", &["network"])])).unwrap();
        assert_eq!(n.normalize("Networking is important."), "Networking is important.");
        assert_eq!(n.normalize("Use a network doctor."), "Use a in-network doctor.");
    }

    #[test]
    fn test_quoted_text_unchanged() {
        let n = builtin();
        let out = n.normalize(r#"The policy says "oop max" and annual deductible."#);
        assert_eq!(out, r#"The policy says "oop max" and deductible."#);
    }

    #[test]
    fn test_empty_map_is_identity() {
        let n = TermNormalizer::default();
        assert_eq!(n.normalize("OOP max here."), "OOP max here.");
    }

    #[test]
    fn test_custom_map() {
        let n = TermNormalizer::new(&map(&[("canonical", &["synonym"])])).unwrap();
        assert_eq!(n.normalize("Use synonym here."), "Use canonical here.");
    }
}
