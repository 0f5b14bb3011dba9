use std::collections::BTreeSet;

use chrono::Utc;
use policy_types::{DocumentRecord, Page};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::Engine;
use crate::chunker::Chunker;
use crate::cleaning::{clean_pages, is_likely_policy, policy_keyword_count};
use crate::config::IngestConfig;
use crate::error::{IngestError, PipelineError, Result};

/// SHA-256 over page numbers and cleaned text, hex encoded
pub fn content_hash(pages: &[Page]) -> String {
    let mut hasher = Sha256::new();
    for page in pages {
        hasher.update(page.page_number.to_be_bytes());
        hasher.update(page.text.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Validates, cleans and chunks pages into a document record. Does no I/O.
///
/// # Errors
///
/// Fails fast on zero pages, page numbers that are 0 or repeated, pages
/// with no text, documents rejected by the policy keyword gate, and
/// documents that produce no units.
pub fn prepare_document(
    doc_id: &str,
    source_name: Option<String>,
    pages: Vec<Page>,
    chunker: &Chunker,
    config: &IngestConfig,
) -> std::result::Result<DocumentRecord, IngestError> {
    if pages.is_empty() {
        return Err(IngestError::NoPages);
    }

    let mut seen = BTreeSet::new();
    for page in &pages {
        if page.page_number == 0 {
            return Err(IngestError::InvalidPageNumber(0));
        }
        if !seen.insert(page.page_number) {
            return Err(IngestError::DuplicatePage(page.page_number));
        }
    }

    let mut pages = pages;
    pages.sort_by_key(|p| p.page_number);

    let cleaned = clean_pages(&pages);
    if cleaned.iter().all(|p| p.text.trim().is_empty()) {
        return Err(IngestError::NoExtractableText);
    }

    let sample: String = cleaned
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .take(config.policy_sample_pages.max(1))
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    if !is_likely_policy(&sample, config.min_policy_keywords) {
        return Err(IngestError::NotAPolicy {
            found: policy_keyword_count(&sample),
            required: config.min_policy_keywords,
        });
    }

    let units = chunker.chunk_document(doc_id, &cleaned)?;

    Ok(DocumentRecord {
        doc_id: doc_id.to_string(),
        source_name,
        content_hash: content_hash(&cleaned),
        created_at: Utc::now(),
        pages: cleaned,
        units,
    })
}

impl Engine {
    /// Ingests extracted pages under a fresh document id. Nothing is stored
    /// when the pages are rejected.
    pub async fn ingest(&self, pages: Vec<Page>, source_name: Option<String>) -> Result<DocumentRecord> {
        let doc_id = Uuid::new_v4().to_string();
        let page_count = pages.len();

        let record = prepare_document(&doc_id, source_name, pages, &self.chunker, &self.config.ingest)
            .map_err(|e| {
                warn!(pages = page_count, error = %e, "Rejected document");
                PipelineError::Ingest(e)
            })?;

        self.store
            .put_document(&record)
            .await
            .map_err(PipelineError::Store)?;

        info!(
            doc_id = %record.doc_id,
            pages = record.page_count(),
            units = record.units.len(),
            "Ingested document"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use pretty_assertions::assert_eq;

    fn prepare(pages: Vec<Page>, config: &IngestConfig) -> std::result::Result<DocumentRecord, IngestError> {
        prepare_document("doc", None, pages, &Chunker::default(), config)
    }

    fn ingest_config() -> IngestConfig {
        EngineConfig::default().ingest
    }

    #[test]
    fn test_rejects_empty_and_blank_documents() {
        assert_eq!(prepare(vec![], &ingest_config()).unwrap_err(), IngestError::NoPages);
        assert_eq!(
            prepare(vec![Page::new(1, "  \n "), Page::new(2, "")], &ingest_config()).unwrap_err(),
            IngestError::NoExtractableText
        );
    }

    #[test]
    fn test_rejects_bad_page_numbers() {
        assert_eq!(
            prepare(vec![Page::new(0, "text")], &ingest_config()).unwrap_err(),
            IngestError::InvalidPageNumber(0)
        );
        assert_eq!(
            prepare(vec![Page::new(2, "a b c"), Page::new(2, "d e f")], &ingest_config()).unwrap_err(),
            IngestError::DuplicatePage(2)
        );
    }

    #[test]
    fn test_pages_sorted_and_hashed() {
        let record = prepare(
            vec![
                Page::new(2, "Copay for primary care is $20."),
                Page::new(1, "The annual deductible is $500."),
            ],
            &ingest_config(),
        )
        .unwrap();
        assert_eq!(record.pages[0].page_number, 1);
        assert_eq!(record.units[0].unit_id, "c_1_0");
        assert_eq!(record.content_hash.len(), 64);
        assert_eq!(record.content_hash, content_hash(&record.pages));
    }

    #[test]
    fn test_policy_gate() {
        let config = IngestConfig {
            min_policy_keywords: 2,
            policy_sample_pages: 3,
        };
        let err = prepare(vec![Page::new(1, "Chocolate cake recipe with flour.")], &config).unwrap_err();
        assert_eq!(err, IngestError::NotAPolicy { found: 0, required: 2 });
        assert!(prepare(
            vec![Page::new(1, "Your deductible and coinsurance apply to covered services.")],
            &config
        )
        .is_ok());
    }
}
