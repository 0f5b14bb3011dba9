//! Page text cleaning applied before chunking
//!
//! Extracted PDF text carries running headers, footers and page markers
//! that would otherwise dominate retrieval. Lines repeated on more than
//! half of the pages are dropped, then page-number and stub lines are
//! trimmed from the top and bottom of each page.

use std::collections::HashMap;

use lazy_static::lazy_static;
use policy_types::Page;
use regex::Regex;

use crate::text::{collapse_whitespace, contains_term};

lazy_static! {
    static ref BARE_NUMBER_RE: Regex = Regex::new(r"^\d+$").unwrap();
    static ref PAGE_OF_RE: Regex = Regex::new(r"(?i)^page\s+\d+\s+of\s+\d+$").unwrap();
    static ref FRACTION_RE: Regex = Regex::new(r"^\d+\s*/\s*\d+$").unwrap();
    static ref BLANK_RUN_RE: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Terms whose presence marks a health insurance policy or summary of benefits
pub const POLICY_KEYWORDS: &[&str] = &[
    // General identifiers
    "summary of benefits",
    "evidence of coverage",
    "policy number",
    "group number",
    // Cost sharing
    "deductible",
    "coinsurance",
    "copayment",
    "out-of-pocket",
    "annual limit",
    "maximum out of pocket",
    "premium",
    "cost-sharing",
    // Service categories
    "primary care",
    "specialist visit",
    "emergency room",
    "urgent care",
    "inpatient hospital",
    "outpatient surgery",
    "preventive care",
    // Pharmacy
    "prescription drug",
    "formulary",
    "generic drug",
    "preferred brand",
    "mail order",
    // Managed care and administration
    "prior authorization",
    "pre-authorization",
    "referral",
    "network provider",
    "non-preferred provider",
    "medically necessary",
    "exclusions",
    "limitations",
];

/// Lines shorter than this at a page edge are treated as layout debris
const MIN_EDGE_LINE_CHARS: usize = 3;

pub fn looks_like_page_number(line: &str) -> bool {
    let line = collapse_whitespace(line);
    line.is_empty()
        || BARE_NUMBER_RE.is_match(&line)
        || PAGE_OF_RE.is_match(&line)
        || FRACTION_RE.is_match(&line)
}

/// Number of distinct policy keywords found in `text`
pub fn policy_keyword_count(text: &str) -> usize {
    let lower = text.to_lowercase();
    POLICY_KEYWORDS
        .iter()
        .filter(|kw| contains_term(&lower, kw))
        .count()
}

/// Keyword gate for uploads. `min_keywords == 0` accepts everything.
pub fn is_likely_policy(text: &str, min_keywords: usize) -> bool {
    min_keywords == 0 || policy_keyword_count(text) >= min_keywords
}

fn remove_repeated_lines(lines_by_page: Vec<Vec<String>>) -> Vec<Vec<String>> {
    if lines_by_page.len() < 2 {
        return lines_by_page;
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for lines in &lines_by_page {
        for line in lines {
            let normalized = collapse_whitespace(line);
            if normalized.len() > 2 {
                *counts.entry(normalized).or_insert(0) += 1;
            }
        }
    }

    let threshold = (lines_by_page.len() / 2).max(2);
    lines_by_page
        .into_iter()
        .map(|lines| {
            lines
                .into_iter()
                .filter(|line| {
                    let normalized = collapse_whitespace(line);
                    counts.get(&normalized).copied().unwrap_or(0) <= threshold
                })
                .collect()
        })
        .collect()
}

fn trim_page_edges(lines: Vec<String>) -> String {
    let is_debris =
        |line: &str| looks_like_page_number(line) || line.chars().count() < MIN_EDGE_LINE_CHARS;

    let start = lines.iter().position(|l| !is_debris(l));
    let end = lines.iter().rposition(|l| !is_debris(l));

    let text = match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    };

    BLANK_RUN_RE.replace_all(&text, "\n\n").trim().to_string()
}

/// Cleans every page, keeping page numbers and order. Pages that end up
/// empty are kept so page numbering stays aligned with the source.
pub fn clean_pages(pages: &[Page]) -> Vec<Page> {
    let lines_by_page: Vec<Vec<String>> = pages
        .iter()
        .map(|p| p.text.lines().map(|l| l.trim().to_string()).collect())
        .collect();

    remove_repeated_lines(lines_by_page)
        .into_iter()
        .zip(pages)
        .map(|(lines, page)| Page::new(page.page_number, trim_page_edges(lines)))
        .collect()
}
