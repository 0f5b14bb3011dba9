//! Contradiction detection between a claim and a source text
//!
//! Two heuristics ship with the engine: conflicting figures bound to the
//! same cost term, and opposite polarity on the same coverage predicate.
//! Both are driven by the term lists in [`ValidationConfig`].

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ValidationConfig;
use crate::text::{content_tokens, overlap_ratio, tokenize, NumberKind, NumberToken, Token};

/// Capability: does `claim` assert something `source` rules out?
pub trait ContradictionCheck: Send + Sync {
    fn contradicts(&self, claim: &str, source: &str) -> bool;

    /// Get the name of this check
    fn name(&self) -> &str;
}

/// Flags claims that attach a different figure to a cost term than the
/// source does, e.g. "deductible is $750" against "deductible: $500".
pub struct NumericConflictCheck {
    anchors: Vec<Vec<String>>,
    window: usize,
}

impl NumericConflictCheck {
    pub fn new<S: AsRef<str>>(anchors: &[S], window: usize) -> Self {
        let anchors = anchors
            .iter()
            .map(|a| phrase_words(a.as_ref()))
            .filter(|words| !words.is_empty())
            .collect();
        Self { anchors, window }
    }

    /// Numbers in `text` grouped by the anchor term that governs them
    fn bindings(&self, text: &str) -> BTreeMap<String, Vec<NumberToken>> {
        let tokens = tokenize(text);
        let spans = self.anchor_spans(&tokens);
        let mut out: BTreeMap<String, Vec<NumberToken>> = BTreeMap::new();

        for (i, token) in tokens.iter().enumerate() {
            let Token::Number(number) = token else {
                continue;
            };

            // Nearest anchor on either side; ties go to the preceding one,
            // then to the longer phrase
            let nearest = spans
                .iter()
                .filter_map(|s| {
                    let (distance, side) = if s.end <= i {
                        (i - s.end, 0u8)
                    } else if s.start > i {
                        (s.start - i - 1, 1u8)
                    } else {
                        return None;
                    };
                    (distance <= self.window)
                        .then_some(((distance, side, usize::MAX - (s.end - s.start)), s))
                })
                .min_by_key(|(rank, _)| *rank)
                .map(|(_, s)| s);

            if let Some(span) = nearest {
                out.entry(span.key.clone()).or_default().push(number.clone());
            }
        }
        out
    }

    fn anchor_spans(&self, tokens: &[Token]) -> Vec<AnchorSpan> {
        let mut spans = Vec::new();
        for start in 0..tokens.len() {
            for anchor in &self.anchors {
                let end = start + anchor.len();
                if end > tokens.len() {
                    continue;
                }
                let matched = tokens[start..end]
                    .iter()
                    .zip(anchor)
                    .all(|(t, w)| matches!(t, Token::Word(word) if word == w));
                if matched {
                    spans.push(AnchorSpan {
                        start,
                        end,
                        key: anchor.join(" "),
                    });
                }
            }
        }
        spans
    }
}

struct AnchorSpan {
    start: usize,
    end: usize, // Exclusive
    key: String,
}

impl ContradictionCheck for NumericConflictCheck {
    fn contradicts(&self, claim: &str, source: &str) -> bool {
        let claim_bindings = self.bindings(claim);
        if claim_bindings.is_empty() {
            return false;
        }
        let source_bindings = self.bindings(source);

        claim_bindings.iter().any(|(anchor, claim_values)| {
            let Some(source_values) = source_bindings.get(anchor) else {
                return false;
            };
            [NumberKind::Currency, NumberKind::Percent, NumberKind::Plain]
                .iter()
                .any(|kind| {
                    let ours: Vec<&NumberToken> =
                        claim_values.iter().filter(|n| n.kind == *kind).collect();
                    let theirs: Vec<&NumberToken> =
                        source_values.iter().filter(|n| n.kind == *kind).collect();
                    !ours.is_empty()
                        && !theirs.is_empty()
                        && !ours.iter().any(|a| theirs.iter().any(|b| a.same_value(b)))
                })
        })
    }

    fn name(&self) -> &str {
        "numeric_conflict"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Polarity {
    Positive,
    Negative,
}

/// Flags claims that negate a coverage predicate the source affirms (or the
/// reverse), e.g. "is covered" against "is not covered".
pub struct NegationConflictCheck {
    cues: BTreeSet<String>,
    predicates: BTreeSet<String>,
    window: usize,
    min_topic_overlap: f64,
}

impl NegationConflictCheck {
    pub fn new<S: AsRef<str>>(
        cues: &[S],
        predicates: &[S],
        window: usize,
        min_topic_overlap: f64,
    ) -> Self {
        Self {
            cues: cues.iter().map(|c| c.as_ref().to_lowercase()).collect(),
            predicates: predicates.iter().map(|p| p.as_ref().to_lowercase()).collect(),
            window,
            min_topic_overlap,
        }
    }

    fn polarities(&self, text: &str) -> BTreeMap<String, BTreeSet<Polarity>> {
        let words: Vec<String> = tokenize(text)
            .into_iter()
            .filter_map(|t| match t {
                Token::Word(w) => Some(w),
                Token::Number(_) => None,
            })
            .collect();

        let mut out: BTreeMap<String, BTreeSet<Polarity>> = BTreeMap::new();
        for (i, word) in words.iter().enumerate() {
            if !self.predicates.contains(word) {
                continue;
            }
            let from = i.saturating_sub(self.window);
            let negated = words[from..i].iter().any(|w| self.cues.contains(w));
            let polarity = if negated {
                Polarity::Negative
            } else {
                Polarity::Positive
            };
            out.entry(word.clone()).or_default().insert(polarity);
        }
        out
    }

    fn topic_overlap(&self, claim: &str, source: &str) -> f64 {
        let strip = |text: &str| -> BTreeSet<String> {
            content_tokens(text)
                .into_iter()
                .filter(|t| !self.cues.contains(t) && !self.predicates.contains(t))
                .collect()
        };
        overlap_ratio(&strip(claim), &strip(source))
    }
}

impl ContradictionCheck for NegationConflictCheck {
    fn contradicts(&self, claim: &str, source: &str) -> bool {
        let ours = self.polarities(claim);
        if ours.is_empty() {
            return false;
        }
        let theirs = self.polarities(source);

        let flipped = ours.iter().any(|(predicate, claim_pol)| {
            match theirs.get(predicate) {
                // Mixed polarity on either side is ambiguous, not a conflict
                Some(source_pol) if claim_pol.len() == 1 && source_pol.len() == 1 => {
                    claim_pol != source_pol
                }
                _ => false,
            }
        });

        flipped && self.topic_overlap(claim, source) >= self.min_topic_overlap
    }

    fn name(&self) -> &str {
        "negation_conflict"
    }
}

/// Runs several checks; any single hit is a contradiction
#[derive(Default)]
pub struct CompositeContradictionCheck {
    checks: Vec<Box<dyn ContradictionCheck>>,
}

impl CompositeContradictionCheck {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Add a check to the composite
    pub fn add_check(mut self, check: Box<dyn ContradictionCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Built-in numeric and negation checks configured from `config`
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new()
            .add_check(Box::new(NumericConflictCheck::new(
                &config.anchors,
                config.anchor_window,
            )))
            .add_check(Box::new(NegationConflictCheck::new(
                &config.negation_cues,
                &config.predicates,
                config.negation_window,
                config.min_topic_overlap,
            )))
    }

    /// Names of the checks that fire for this pair
    pub fn triggered(&self, claim: &str, source: &str) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.contradicts(claim, source))
            .map(|c| c.name())
            .collect()
    }
}

impl ContradictionCheck for CompositeContradictionCheck {
    fn contradicts(&self, claim: &str, source: &str) -> bool {
        self.checks.iter().any(|c| c.contradicts(claim, source))
    }

    fn name(&self) -> &str {
        "composite"
    }
}

fn phrase_words(phrase: &str) -> Vec<String> {
    tokenize(phrase)
        .into_iter()
        .filter_map(|t| match t {
            Token::Word(w) => Some(w),
            Token::Number(_) => None,
        })
        .collect()
}
