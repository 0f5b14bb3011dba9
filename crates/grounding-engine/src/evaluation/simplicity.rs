//! Simplicity: how much easier the summary reads than the source
//!
//! Three sub-signals, each clamped to [0, 1] and averaged:
//!
//! - relative reduction in average words per sentence
//! - relative reduction in jargon rate (share of distinct words on the
//!   jargon list)
//! - Flesch reading ease gain divided by 100 (only when the source scores
//!   at most 100)

use std::collections::{BTreeSet, HashSet};

use policy_types::{ReadabilityStats, SimplicityReport};

use crate::text::{flesch_reading_ease, split_sentences, words};

pub fn readability(text: &str, jargon: &HashSet<String>) -> ReadabilityStats {
    let sentence_count = split_sentences(text).len();
    let ws = words(text);
    if sentence_count == 0 || ws.is_empty() {
        return ReadabilityStats::default();
    }

    let distinct: BTreeSet<&str> = ws.iter().map(String::as_str).collect();
    let jargon_hits = distinct.iter().filter(|w| jargon.contains(**w)).count();

    ReadabilityStats {
        word_count: ws.len(),
        sentence_count,
        avg_sentence_length: ws.len() as f64 / sentence_count as f64,
        jargon_rate: jargon_hits as f64 / distinct.len() as f64,
        flesch_reading_ease: flesch_reading_ease(text),
    }
}

fn relative_reduction(original: f64, summary: f64) -> f64 {
    if original <= 0.0 {
        return 0.0;
    }
    ((original - summary) / original).clamp(0.0, 1.0)
}

/// Returns the score and the readability comparison
pub fn simplicity(original: &str, summary: &str, jargon: &HashSet<String>) -> (f64, SimplicityReport) {
    let original = readability(original, jargon);
    let summary = readability(summary, jargon);

    let sentence_length_reduction =
        relative_reduction(original.avg_sentence_length, summary.avg_sentence_length);
    let jargon_reduction = relative_reduction(original.jargon_rate, summary.jargon_rate);
    let readability_improvement = if original.flesch_reading_ease <= 100.0 {
        ((summary.flesch_reading_ease - original.flesch_reading_ease) / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let score = ((sentence_length_reduction + jargon_reduction + readability_improvement) / 3.0)
        .clamp(0.0, 1.0);

    let report = SimplicityReport {
        original,
        summary,
        sentence_length_reduction,
        jargon_reduction,
        readability_improvement,
    };
    (score, report)
}

/// Bullets joined as sentences; a bullet without terminal punctuation gets
/// a full stop so it does not run into the next one.
pub fn summary_text<'a, I: IntoIterator<Item = &'a str>>(bullets: I) -> String {
    bullets
        .into_iter()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| {
            if b.ends_with(|c: char| matches!(c, '.' | '!' | '?')) {
                b.to_string()
            } else {
                format!("{}.", b)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jargon() -> HashSet<String> {
        ["deductible", "coinsurance", "notwithstanding", "pursuant", "thereof"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    const ORIGINAL: &str = "Notwithstanding any provision hereof, pursuant to the terms thereof, \
        the member shall remain responsible for coinsurance amounts calculated upon the allowed \
        amount after satisfaction of the annual deductible applicable to the covered person.";

    #[test]
    fn test_plain_summary_scores_well() {
        let summary = summary_text(["You pay 20% after the deductible", "Your plan pays the rest."]);
        let (score, report) = simplicity(ORIGINAL, &summary, &jargon());
        assert_eq!(report.summary.sentence_count, 2);
        assert!(report.sentence_length_reduction > 0.5);
        assert!(report.jargon_reduction > 0.0);
        assert!(report.readability_improvement > 0.0);
        assert!(score > 0.3 && score <= 1.0);
    }

    #[test]
    fn test_harder_summary_clamps_to_zero() {
        let (score, report) = simplicity("You pay $20. That is all.", ORIGINAL, &jargon());
        assert_eq!(report.sentence_length_reduction, 0.0);
        assert_eq!(report.readability_improvement, 0.0);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_jargon_rate_uses_distinct_words() {
        let stats = readability("Deductible deductible deductible plan.", &jargon());
        assert_eq!(stats.word_count, 4);
        assert!((stats.jargon_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(readability("   ", &jargon()), ReadabilityStats::default());
        let (score, _) = simplicity("", "", &jargon());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_summary_text_terminates_bullets() {
        assert_eq!(summary_text(["One", "Two!", "  "]), "One. Two!");
    }
}
