//! Lexical retrieval and per-section multi-query retrieval
//!
//! [`LexicalRetriever`] ranks a document's stored units by cosine similarity
//! of stopword-filtered term frequencies. It needs no index or model, and for
//! a fixed store state it always returns the same ranking.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::try_join_all;
use policy_types::Unit;
use tracing::debug;

use crate::collaborators::{DocumentStore, RetrievedUnit, Retriever};
use crate::error::StoreError;
use crate::sections::CanonicalSection;
use crate::text::{is_stopword, words};

type TermVector = HashMap<String, f64>;

fn term_vector(text: &str) -> TermVector {
    let mut tf = TermVector::new();
    for word in words(text) {
        if !is_stopword(&word) {
            *tf.entry(word).or_insert(0.0) += 1.0;
        }
    }
    tf
}

fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }
    let norm = |v: &TermVector| v.values().map(|x| x * x).sum::<f64>().sqrt();
    dot / (norm(a) * norm(b))
}

/// Rank `units` against `query`; zero-similarity units are left out
pub fn rank_units(units: &[Unit], query: &str, top_k: usize) -> Vec<RetrievedUnit> {
    let query_vec = term_vector(query);
    if query_vec.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &Unit)> = units
        .iter()
        .map(|u| (cosine(&query_vec, &term_vector(&u.text)), u))
        .filter(|(score, _)| *score > 0.0)
        .collect();

    // Highest similarity first, then document order
    scored.sort_by(|(sa, a), (sb, b)| {
        sb.total_cmp(sa)
            .then_with(|| a.page_number.cmp(&b.page_number))
            .then_with(|| a.sequence_index.cmp(&b.sequence_index))
    });

    scored
        .into_iter()
        .take(top_k)
        .map(|(similarity, u)| RetrievedUnit {
            unit_id: u.unit_id.clone(),
            page_number: u.page_number,
            sequence_index: u.sequence_index,
            text: u.text.clone(),
            similarity,
        })
        .collect()
}

pub struct LexicalRetriever {
    store: Arc<dyn DocumentStore>,
}

impl LexicalRetriever {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    async fn retrieve(&self, doc_id: &str, query: &str, top_k: usize) -> Result<Vec<RetrievedUnit>> {
        let record = self
            .store
            .get_document(doc_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(doc_id.to_string()))?;

        let hits = rank_units(&record.units, query, top_k);
        debug!(doc_id, hits = hits.len(), top_k, "Lexical retrieval");
        Ok(hits)
    }
}

/// Runs every sub-query of `section`, keeps the best similarity per unit,
/// caps the set at `max_units` strongest units and returns it in page order.
pub async fn retrieve_for_section(
    retriever: &dyn Retriever,
    doc_id: &str,
    section: CanonicalSection,
    per_query_k: usize,
    max_units: usize,
) -> Result<Vec<RetrievedUnit>> {
    let batches = try_join_all(
        section
            .queries()
            .iter()
            .map(|query| retriever.retrieve(doc_id, query, per_query_k)),
    )
    .await?;

    let mut best: BTreeMap<String, RetrievedUnit> = BTreeMap::new();
    for hit in batches.into_iter().flatten() {
        match best.get(&hit.unit_id) {
            Some(existing) if existing.similarity >= hit.similarity => {}
            _ => {
                best.insert(hit.unit_id.clone(), hit);
            }
        }
    }

    let mut units: Vec<RetrievedUnit> = best.into_values().collect();
    units.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then_with(|| a.unit_id.cmp(&b.unit_id)));
    units.truncate(max_units);
    units.sort_by_key(|u| (u.page_number, u.sequence_index));

    debug!(doc_id, section = section.id(), units = units.len(), "Section retrieval");
    Ok(units)
}

/// Similarity of the best hit, the retrieval-strength signal
pub fn retrieval_strength(units: &[RetrievedUnit]) -> Option<f64> {
    units.iter().map(|u| u.similarity).reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use chrono::Utc;
    use policy_types::{DocumentRecord, Page};

    fn unit(page: u32, seq: u32, text: &str) -> Unit {
        Unit {
            unit_id: crate::chunker::unit_id(page, seq),
            doc_id: "doc".to_string(),
            page_number: page,
            sequence_index: seq,
            text: text.to_string(),
            token_count: crate::text::approx_tokens(text),
        }
    }

    fn units() -> Vec<Unit> {
        vec![
            unit(1, 0, "Plan name: Acme Gold PPO. This plan type is a PPO."),
            unit(2, 0, "The annual deductible is $500. Copay for primary care is $20."),
            unit(3, 0, "Prior authorization is required for MRI. Referrals are required for specialists."),
            unit(4, 0, "Exclusions: cosmetic surgery is not covered."),
        ]
    }

    #[test]
    fn test_rank_prefers_matching_unit() {
        let hits = rank_units(&units(), "what is the deductible", 3);
        assert_eq!(hits[0].unit_id, "c_2_0");
        assert!(hits[0].similarity > 0.0);
        assert!(hits.iter().all(|h| h.similarity > 0.0));
    }

    #[test]
    fn test_rank_is_deterministic() {
        let a = rank_units(&units(), "required authorization", 4);
        let b = rank_units(&units(), "required authorization", 4);
        assert_eq!(a, b);
    }

    #[test]
    fn test_rank_stopword_query_is_empty() {
        assert!(rank_units(&units(), "what is the", 5).is_empty());
        assert!(rank_units(&units(), "deductible", 0).is_empty());
    }

    #[test]
    fn test_strength_is_max() {
        let hits = rank_units(&units(), "deductible copay", 4);
        assert_eq!(retrieval_strength(&hits), Some(hits[0].similarity));
        assert_eq!(retrieval_strength(&[]), None);
    }

    #[tokio::test]
    async fn test_section_retrieval_dedupes_and_orders_by_page() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let record = DocumentRecord {
            doc_id: "doc".to_string(),
            source_name: None,
            content_hash: String::new(),
            created_at: Utc::now(),
            pages: vec![Page::new(1, "x")],
            units: units(),
        };
        store.put_document(&record).await.unwrap();
        let retriever = LexicalRetriever::new(store);

        let hits = retrieve_for_section(&retriever, "doc", CanonicalSection::CostSummary, 4, 18)
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.unit_id.as_str()).collect();
        let distinct: std::collections::BTreeSet<&str> = ids.iter().copied().collect();
        assert_eq!(distinct.len(), ids.len());
        assert!(ids.contains(&"c_2_0"));
        assert!(hits.windows(2).all(|w| w[0].page_number <= w[1].page_number));

        let capped = retrieve_for_section(&retriever, "doc", CanonicalSection::CostSummary, 4, 1)
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn test_section_retrieval_orders_by_sequence_within_page() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let record = DocumentRecord {
            doc_id: "doc".to_string(),
            source_name: None,
            content_hash: String::new(),
            created_at: Utc::now(),
            pages: vec![Page::new(2, "x")],
            units: (0..12)
                .map(|seq| unit(2, seq, &format!("The deductible applies to tier {} services.", seq)))
                .collect(),
        };
        store.put_document(&record).await.unwrap();
        let retriever = LexicalRetriever::new(store);

        let hits = retrieve_for_section(&retriever, "doc", CanonicalSection::CostSummary, 12, 12)
            .await
            .unwrap();
        assert!(hits.len() > 10);
        let order: Vec<u32> = hits.iter().map(|h| h.sequence_index).collect();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted);
        assert!(hits.iter().position(|h| h.unit_id == "c_2_2") < hits.iter().position(|h| h.unit_id == "c_2_10"));
    }

    #[tokio::test]
    async fn test_unknown_document_is_error() {
        let retriever = LexicalRetriever::new(Arc::new(InMemoryDocumentStore::new()));
        assert!(retriever.retrieve("missing", "deductible", 3).await.is_err());
    }
}
