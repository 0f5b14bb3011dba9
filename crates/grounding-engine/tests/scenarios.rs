//! End-to-end scenarios through the pipeline with local collaborators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use grounding_engine::{
    CachedDocumentStore, CitationValidator, DetailLevel, DocumentCache, DocumentStore, Engine,
    EngineConfig, GenerationRequest, Generator, IngestError, InMemoryDocumentStore,
    LexicalRetriever, PipelineError, UnitIndex,
};
use policy_types::{AnswerType, Citation, Claim, Page, SupportStatus, Unit};
use pretty_assertions::assert_eq;

/// Returns the top retrieved unit verbatim, cited correctly
struct EchoGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<Vec<Claim>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(request
            .units
            .iter()
            .take(1)
            .map(|u| Claim::new(u.text.clone(), vec![Citation::new(u.unit_id.clone(), u.page_number)]))
            .collect())
    }
}

struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> anyhow::Result<Vec<Claim>> {
        Err(anyhow!("model unavailable"))
    }
}

fn engine_with(generator: Arc<dyn Generator>) -> (Engine, Arc<dyn DocumentStore>) {
    let store: Arc<dyn DocumentStore> = Arc::new(CachedDocumentStore::new(
        InMemoryDocumentStore::new(),
        DocumentCache::default(),
    ));
    let retriever = Arc::new(LexicalRetriever::new(Arc::clone(&store)));
    let engine = Engine::new(EngineConfig::default(), Arc::clone(&store), retriever, generator).unwrap();
    (engine, store)
}

fn policy_pages() -> Vec<Page> {
    vec![
        Page::new(1, "Acme Gold PPO Plan. The plan type is a PPO with a national provider network."),
        Page::new(
            2,
            "The annual deductible is $500 per person. The out-of-pocket maximum is $3,000. \
             Primary care visits have a $20 copay. Specialist visits have a $40 copay.",
        ),
        Page::new(
            3,
            "Prior authorization is required for MRI imaging. Cosmetic surgery is not covered.",
        ),
    ]
}

// ============================================================
// Ingestion
// ============================================================

#[tokio::test]
async fn empty_document_is_rejected_and_not_persisted() {
    let (engine, store) = engine_with(Arc::new(FailingGenerator));

    let err = engine.ingest(vec![], None).await.unwrap_err();
    assert!(matches!(err, PipelineError::Ingest(IngestError::NoPages)));

    let err = engine
        .ingest(vec![Page::new(1, "   "), Page::new(2, "\n\n")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Ingest(IngestError::NoExtractableText)));

    assert!(store.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn ingest_persists_units() {
    let (engine, _) = engine_with(Arc::new(FailingGenerator));
    let record = engine
        .ingest(policy_pages(), Some("acme.pdf".to_string()))
        .await
        .unwrap();

    let units = engine.units(&record.doc_id).await.unwrap();
    assert_eq!(units, record.units);
    assert_eq!(
        units.iter().map(|u| u.unit_id.as_str()).collect::<Vec<_>>(),
        vec!["c_1_0", "c_2_0", "c_3_0"]
    );
    assert_eq!(engine.list_documents().await.unwrap(), vec![record.doc_id.clone()]);

    engine.delete_document(&record.doc_id).await.unwrap();
    assert!(matches!(
        engine.units(&record.doc_id).await,
        Err(PipelineError::DocumentNotFound(_))
    ));
}

// ============================================================
// Citation integrity
// ============================================================

#[test]
fn citation_to_wrong_page_is_unsupported() {
    let units = vec![Unit {
        unit_id: "u1".to_string(),
        doc_id: "doc".to_string(),
        page_number: 3,
        sequence_index: 0,
        text: "The specialist copay is $40 per visit.".to_string(),
        token_count: 10,
    }];
    let index = UnitIndex::new(&units);
    let validator = CitationValidator::default();

    // One of five content tokens shared: 20% overlap
    let text = "Members pay copay amounts monthly";
    let ok = validator.validate(&Claim::new(text, vec![Citation::new("u1", 3)]), &index);
    assert_eq!(ok.support_status, SupportStatus::Supported);
    assert_eq!(ok.valid_citations, vec![Citation::new("u1", 3)]);

    let wrong = validator.validate(&Claim::new(text, vec![Citation::new("u1", 4)]), &index);
    assert_eq!(wrong.support_status, SupportStatus::Unsupported);
    assert!(wrong.valid_citations.is_empty());
}

// ============================================================
// Q&A
// ============================================================

#[tokio::test]
async fn unrelated_question_is_not_found_without_generation() {
    // Any generator call would fail the request
    let (engine, _) = engine_with(Arc::new(FailingGenerator));
    let record = engine.ingest(policy_pages(), None).await.unwrap();

    let response = engine
        .answer(&record.doc_id, "Is acupuncture for horses reimbursed?")
        .await
        .unwrap();
    assert_eq!(response.envelope.answer_type, AnswerType::NotFound);
    assert!(response.envelope.claims.is_empty());
    assert!(response.envelope.citations.is_empty());
    assert_eq!(response.envelope.confidence, 0.05);
    assert_eq!(response.answer, "Not found in this document.");
}

#[tokio::test]
async fn grounded_answer_carries_page_markers() {
    let generator = Arc::new(EchoGenerator {
        calls: AtomicUsize::new(0),
    });
    let (engine, _) = engine_with(generator.clone());
    let record = engine.ingest(policy_pages(), None).await.unwrap();

    let response = engine
        .answer(&record.doc_id, "What is the copay for a specialist visit?")
        .await
        .unwrap();
    assert_eq!(response.envelope.answer_type, AnswerType::Normal);
    assert_eq!(response.envelope.citations, vec![Citation::new("c_2_0", 2)]);
    assert!(response.answer.ends_with("(p. 2)"), "{}", response.answer);
    assert!(response.envelope.confidence > 0.5);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn broad_question_asks_for_clarification() {
    let (engine, _) = engine_with(Arc::new(FailingGenerator));
    let record = engine.ingest(policy_pages(), None).await.unwrap();

    let response = engine.answer(&record.doc_id, "What is covered?").await.unwrap();
    assert_eq!(response.envelope.answer_type, AnswerType::Clarification);
    assert!(response.envelope.claims.is_empty());
    assert_eq!(response.answer, EngineConfig::default().classifier.clarification_prompt);
}

#[tokio::test]
async fn generation_failure_surfaces_in_qa() {
    let (engine, _) = engine_with(Arc::new(FailingGenerator));
    let record = engine.ingest(policy_pages(), None).await.unwrap();

    let err = engine
        .answer(&record.doc_id, "What is the copay for a specialist visit?")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
}

// ============================================================
// Summary and evaluation
// ============================================================

#[tokio::test]
async fn summary_keeps_only_grounded_bullets_and_evaluates() {
    let (engine, _) = engine_with(Arc::new(EchoGenerator {
        calls: AtomicUsize::new(0),
    }));
    let record = engine.ingest(policy_pages(), None).await.unwrap();

    let summary = engine.summarize(&record.doc_id, DetailLevel::Standard).await.unwrap();
    assert_eq!(summary.sections.len(), 6);
    assert_eq!(summary.metadata.total_pages, 3);
    let cost = summary.section("cost_summary").unwrap();
    assert!(cost.present);
    for bullet in summary.sections.iter().flat_map(|s| s.bullets.iter()) {
        assert!(bullet.is_supported());
        assert!(!bullet.valid_citations.is_empty());
    }

    let stored = engine.stored_summary(&record.doc_id).await.unwrap();
    assert_eq!(stored.as_ref(), Some(&summary));

    let report = engine.evaluate(&record.doc_id).await.unwrap();
    assert_eq!(report.faithfulness_score, 1.0);
    assert!(report.completeness_score > 0.0);
    assert_eq!(
        engine.stored_evaluation(&record.doc_id).await.unwrap(),
        Some(report)
    );
}

#[tokio::test]
async fn failed_generation_yields_empty_summary_and_zero_scores() {
    let (engine, _) = engine_with(Arc::new(FailingGenerator));
    let record = engine.ingest(policy_pages(), None).await.unwrap();

    let summary = engine.summarize(&record.doc_id, DetailLevel::Standard).await.unwrap();
    assert_eq!(summary.bullet_count(), 0);
    assert!(summary.sections.iter().all(|s| !s.present));
    assert!(summary
        .section("cost_summary")
        .unwrap()
        .validation_issues
        .contains(&"generation_failed".to_string()));

    let report = engine.evaluate(&record.doc_id).await.unwrap();
    assert_eq!(report.faithfulness_score, 0.0);
    assert_eq!(report.completeness_score, 0.0);
    assert_eq!(report.simplicity_score, 0.0);
    assert_eq!(
        report.errors,
        vec![
            "faithfulness:summary_empty",
            "completeness:summary_empty",
            "simplicity:summary_empty"
        ]
    );
}
