//! Page-bounded chunking of document text into citable units
//!
//! Units never span pages. Within a page the text is split into paragraphs
//! and sentences, and sentences accumulate until the next one would push the
//! unit over `max_tokens`. Once a unit reaches `target_tokens` it also closes
//! at the next paragraph break. Sentences longer than `max_tokens` are
//! force-split at word boundaries. A few trailing sentences of each closed
//! unit seed the next one (`overlap_tokens`) whenever that still fits.

use lazy_static::lazy_static;
use policy_types::{Page, Unit};
use regex::Regex;
use tracing::debug;

use crate::config::ChunkingConfig;
use crate::error::IngestError;
use crate::text::split_sentences;

lazy_static! {
    static ref PARAGRAPH_BREAK_RE: Regex = Regex::new(r"\n\s*\n").unwrap();
}

/// Tokens for a span of `chars` characters (4 chars per token, rounded up)
fn tokens_for_chars(chars: usize) -> usize {
    (chars + 3) / 4
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    chars: usize,
    starts_paragraph: bool,
}

impl Piece {
    fn new(text: String, starts_paragraph: bool) -> Self {
        let chars = text.chars().count();
        Self {
            text,
            chars,
            starts_paragraph,
        }
    }
}

#[derive(Debug, Default, Clone)]
struct Draft {
    pieces: Vec<Piece>,
    seeded: usize, // Leading pieces copied from the previous unit
}

impl Draft {
    fn chars(&self) -> usize {
        let text: usize = self.pieces.iter().map(|p| p.chars).sum();
        text + self.pieces.len().saturating_sub(1)
    }

    fn tokens(&self) -> usize {
        tokens_for_chars(self.chars())
    }

    fn tokens_with(&self, piece: &Piece) -> usize {
        let extra = if self.pieces.is_empty() {
            piece.chars
        } else {
            piece.chars + 1
        };
        tokens_for_chars(self.chars() + extra)
    }

    fn has_new_content(&self) -> bool {
        self.pieces.len() > self.seeded
    }

    fn text(&self) -> String {
        self.pieces
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Splits document pages into units
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Chunk every page in order.
    ///
    /// # Errors
    ///
    /// [`IngestError::NoPages`] for an empty page list and
    /// [`IngestError::NoUnits`] when no page contains any text.
    pub fn chunk_document(&self, doc_id: &str, pages: &[Page]) -> Result<Vec<Unit>, IngestError> {
        if pages.is_empty() {
            return Err(IngestError::NoPages);
        }

        let units: Vec<Unit> = pages
            .iter()
            .flat_map(|page| self.chunk_page(doc_id, page))
            .collect();

        if units.is_empty() {
            return Err(IngestError::NoUnits);
        }

        debug!(
            doc_id,
            pages = pages.len(),
            units = units.len(),
            "Chunked document"
        );
        Ok(units)
    }

    /// Chunk a single page. Whitespace-only pages yield no units.
    pub fn chunk_page(&self, doc_id: &str, page: &Page) -> Vec<Unit> {
        let pieces = self.pieces(&page.text);
        if pieces.is_empty() {
            return Vec::new();
        }

        let drafts = self.merge_short_tail(self.accumulate(pieces));

        drafts
            .into_iter()
            .enumerate()
            .map(|(seq, draft)| {
                let text = draft.text();
                Unit {
                    unit_id: unit_id(page.page_number, seq as u32),
                    doc_id: doc_id.to_string(),
                    page_number: page.page_number,
                    sequence_index: seq as u32,
                    token_count: tokens_for_chars(text.chars().count()),
                    text,
                }
            })
            .collect()
    }

    fn pieces(&self, text: &str) -> Vec<Piece> {
        let max_chars = self.config.max_tokens * 4;
        let mut pieces = Vec::new();

        for paragraph in PARAGRAPH_BREAK_RE.split(text) {
            let mut first = true;
            for sentence in split_sentences(paragraph) {
                for part in force_split(&sentence, max_chars) {
                    pieces.push(Piece::new(part, first));
                    first = false;
                }
            }
        }

        pieces
    }

    fn accumulate(&self, pieces: Vec<Piece>) -> Vec<Draft> {
        let max = self.config.max_tokens;
        let target = self.config.target_tokens;

        let mut drafts = Vec::new();
        let mut current = Draft::default();

        for piece in pieces {
            let over_max = current.tokens_with(&piece) > max;
            let paragraph_close = piece.starts_paragraph && current.tokens() >= target;

            if current.has_new_content() && (over_max || paragraph_close) {
                let seed = self.overlap_seed(&current);
                drafts.push(std::mem::take(&mut current));
                current = seed;
            }

            // Drop the overlap rather than exceed the bound
            if current.tokens_with(&piece) > max {
                current = Draft::default();
            }

            current.pieces.push(piece);
        }

        if current.has_new_content() {
            drafts.push(current);
        }
        drafts
    }

    /// Trailing pieces of `draft` whose combined size fits in the overlap budget
    fn overlap_seed(&self, draft: &Draft) -> Draft {
        let budget = self.config.overlap_tokens;
        if budget == 0 {
            return Draft::default();
        }

        let mut seed: Vec<Piece> = Vec::new();
        let mut chars = 0usize;
        for piece in draft.pieces.iter().rev() {
            let next = if seed.is_empty() {
                piece.chars
            } else {
                chars + 1 + piece.chars
            };
            if tokens_for_chars(next) > budget {
                break;
            }
            chars = next;
            seed.insert(0, piece.clone());
        }

        // Never re-emit an entire unit as overlap
        if seed.len() == draft.pieces.len() {
            seed.remove(0);
        }

        Draft {
            seeded: seed.len(),
            pieces: seed,
        }
    }

    /// Folds a final unit below `min_tokens` into its predecessor when the
    /// result still fits in `max_tokens`.
    fn merge_short_tail(&self, mut drafts: Vec<Draft>) -> Vec<Draft> {
        if drafts.len() < 2 {
            return drafts;
        }
        let last = &drafts[drafts.len() - 1];
        if last.tokens() >= self.config.min_tokens {
            return drafts;
        }

        let prev = &drafts[drafts.len() - 2];
        let mut merged = prev.clone();
        merged
            .pieces
            .extend(last.pieces.iter().skip(last.seeded).cloned());

        if merged.tokens() <= self.config.max_tokens {
            drafts.pop();
            drafts.pop();
            drafts.push(merged);
        }
        drafts
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(crate::config::EngineConfig::default().chunking)
    }
}

pub fn unit_id(page_number: u32, sequence_index: u32) -> String {
    format!("c_{}_{}", page_number, sequence_index)
}

/// Splits `sentence` into parts of at most `max_chars` characters, breaking
/// at word boundaries and falling back to raw character boundaries for a
/// single over-long word.
fn force_split(sentence: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || sentence.chars().count() <= max_chars {
        return vec![sentence.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for word in sentence.split_whitespace() {
        let word_chars = word.chars().count();

        if word_chars > max_chars {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for slice in chars.chunks(max_chars) {
                parts.push(slice.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_chars
        } else {
            current_chars + 1 + word_chars
        };
        if needed > max_chars {
            parts.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(word);
        current_chars += word_chars;
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
