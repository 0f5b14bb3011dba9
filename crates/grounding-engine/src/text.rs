//! Text utilities shared by every component
//!
//! Tokenization is deliberately simple and deterministic: lowercase ASCII
//! word tokens, numbers with their unit (currency, percent or plain), and a
//! punctuation-based sentence splitter.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TOKEN_RE: Regex =
        Regex::new(r"(?P<num>\$?\d[\d,]*(?:\.\d+)?\s?%?)|(?P<word>[a-z]+)").unwrap();
    static ref WORD_RE: Regex = Regex::new(r"[a-z0-9]+").unwrap();
    static ref VOWEL_GROUP_RE: Regex = Regex::new(r"[aeiouy]+").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Function words ignored when measuring overlap between two texts
pub const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "do", "does", "for",
    "from", "has", "have", "if", "in", "into", "is", "it", "its", "may", "of", "on", "or",
    "our", "per", "shall", "so", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "to", "upon", "was", "we", "were", "what",
    "when", "which", "who", "will", "with", "would", "you", "your",
];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumberKind {
    Currency,
    Percent,
    Plain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberToken {
    pub value: f64,
    pub kind: NumberKind,
}

impl NumberToken {
    /// Canonical text form, so "$1,000.00" and "$1000" compare equal
    pub fn canonical(&self) -> String {
        let prefix = match self.kind {
            NumberKind::Currency => "$",
            _ => "",
        };
        let suffix = match self.kind {
            NumberKind::Percent => "%",
            _ => "",
        };
        format!("{}{}{}", prefix, self.value, suffix)
    }

    pub fn same_value(&self, other: &NumberToken) -> bool {
        (self.value - other.value).abs() < 1e-9
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Word(String),
    Number(NumberToken),
}

fn parse_number(raw: &str) -> Option<NumberToken> {
    let trimmed = raw.trim();
    let kind = if trimmed.starts_with('$') {
        NumberKind::Currency
    } else if trimmed.ends_with('%') {
        NumberKind::Percent
    } else {
        NumberKind::Plain
    };
    let digits: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse::<f64>().ok().map(|value| NumberToken { value, kind })
}

/// Ordered word and number tokens of `text` (lowercased)
pub fn tokenize(text: &str) -> Vec<Token> {
    let lower = text.to_lowercase();
    let mut tokens = Vec::new();

    for cap in TOKEN_RE.captures_iter(&lower) {
        if let Some(num) = cap.name("num") {
            if let Some(number) = parse_number(num.as_str()) {
                tokens.push(Token::Number(number));
            }
        } else if let Some(word) = cap.name("word") {
            // "20 percent" is the same as "20%"
            if word.as_str() == "percent" {
                if let Some(Token::Number(prev)) = tokens.last_mut() {
                    if prev.kind == NumberKind::Plain {
                        prev.kind = NumberKind::Percent;
                        continue;
                    }
                }
            }
            tokens.push(Token::Word(word.as_str().to_string()));
        }
    }

    tokens
}

pub fn numbers(text: &str) -> Vec<NumberToken> {
    tokenize(text)
        .into_iter()
        .filter_map(|t| match t {
            Token::Number(n) => Some(n),
            Token::Word(_) => None,
        })
        .collect()
}

/// Lowercased alphanumeric tokens with stopwords removed
pub fn content_tokens(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| !is_stopword(w))
        .map(str::to_string)
        .collect()
}

/// Fraction of the claim's content tokens that also appear in the source.
pub fn overlap_ratio(claim: &BTreeSet<String>, source: &BTreeSet<String>) -> f64 {
    if claim.is_empty() {
        return 0.0;
    }
    let shared = claim.intersection(source).count();
    shared as f64 / claim.len() as f64
}

/// True when both texts mention at least one identical number of the same kind
pub fn shares_number(a: &str, b: &str) -> bool {
    let left = numbers(a);
    if left.is_empty() {
        return false;
    }
    let right = numbers(b);
    left.iter()
        .any(|x| right.iter().any(|y| x.kind == y.kind && x.same_value(y)))
}

/// Approximate model tokens: four characters per token, rounded up
pub fn approx_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    (chars + 3) / 4
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Splits on `.`, `!` or `?` followed by whitespace. The terminator stays
/// with its sentence; decimals such as "1.5" are not split.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if let Some(next) = chars.peek() {
                if next.is_whitespace() {
                    let sentence = collapse_whitespace(&current);
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    current.clear();
                }
            }
        }
    }

    let tail = collapse_whitespace(&current);
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Case-insensitive phrase match on word boundaries. `haystack` must
/// already be lowercase.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    find_term(haystack, term).is_some()
}

/// Byte offset of the first word-bounded match of `term` in `haystack`
pub fn find_term(haystack: &str, term: &str) -> Option<usize> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let after_ok = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(start);
        }
        from = start + needle.len();
        if from >= haystack.len() {
            break;
        }
        // Step to the next char boundary
        while !haystack.is_char_boundary(from) {
            from += 1;
        }
    }
    None
}

pub fn words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Vowel-group syllable estimate, minimum one per word
pub fn count_syllables(word: &str) -> usize {
    VOWEL_GROUP_RE.find_iter(&word.to_lowercase()).count().max(1)
}

/// Flesch reading ease. Higher is easier; empty text scores 0.
pub fn flesch_reading_ease(text: &str) -> f64 {
    let sentences = split_sentences(text).len();
    let ws = words(text);
    if sentences == 0 || ws.is_empty() {
        return 0.0;
    }
    let syllables: usize = ws.iter().map(|w| count_syllables(w)).sum();
    let words_per_sentence = ws.len() as f64 / sentences as f64;
    let syllables_per_word = syllables as f64 / ws.len() as f64;
    206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word
}

/// Truncates to at most `max_chars` characters, appending "..." when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
