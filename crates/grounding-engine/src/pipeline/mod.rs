//! Orchestration of ingest, summary, Q&A and evaluation
//!
//! [`Engine`] owns the configured grounding components and the collaborator
//! handles. Each operation is strictly ordered for one document (chunk,
//! retrieve, generate, validate, score); different documents are
//! independent and may be processed concurrently.

mod ingest;
mod qa;
mod summary;

use std::sync::Arc;

use policy_types::{DocumentRecord, EvaluationReport, PolicySummary, Unit};
use tracing::info;

use crate::chunker::Chunker;
use crate::classifier::InteractionClassifier;
use crate::collaborators::{DocumentStore, Generator, Retriever};
use crate::confidence::ConfidenceScorer;
use crate::config::EngineConfig;
use crate::error::{ConfigError, PipelineError, Result};
use crate::evaluation::Evaluator;
use crate::terminology::TermNormalizer;
use crate::validator::CitationValidator;

pub use ingest::{content_hash, prepare_document};
pub use qa::{page_markers, render_answer};
pub use summary::{bullet_count_issues, DetailLevel};

pub struct Engine {
    config: Arc<EngineConfig>,
    chunker: Chunker,
    validator: CitationValidator,
    scorer: ConfidenceScorer,
    classifier: InteractionClassifier,
    evaluator: Evaluator,
    terms: TermNormalizer,
    store: Arc<dyn DocumentStore>,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn DocumentStore>,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let validator = CitationValidator::from_config(&config.validation);
        let classifier = InteractionClassifier::new(
            &config.classifier,
            config.retrieval.similarity_floor,
            validator.contradiction_check(),
        )?;

        Ok(Self {
            chunker: Chunker::new(config.chunking.clone()),
            scorer: ConfidenceScorer::new(config.confidence.clone()),
            evaluator: Evaluator::new(config.evaluation.clone(), validator.clone()),
            terms: TermNormalizer::new(&config.terminology)?,
            validator,
            classifier,
            config: Arc::new(config),
            store,
            retriever,
            generator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn classifier(&self) -> &InteractionClassifier {
        &self.classifier
    }

    pub(crate) async fn load_document(&self, doc_id: &str) -> Result<DocumentRecord> {
        self.store
            .get_document(doc_id)
            .await
            .map_err(PipelineError::Store)?
            .ok_or_else(|| PipelineError::DocumentNotFound(doc_id.to_string()))
    }

    /// Units of a stored document in document order
    pub async fn units(&self, doc_id: &str) -> Result<Vec<Unit>> {
        Ok(self.load_document(doc_id).await?.units)
    }

    pub async fn delete_document(&self, doc_id: &str) -> Result<()> {
        let removed = self
            .store
            .delete_document(doc_id)
            .await
            .map_err(PipelineError::Store)?;
        if !removed {
            return Err(PipelineError::DocumentNotFound(doc_id.to_string()));
        }
        info!(doc_id, "Deleted document");
        Ok(())
    }

    pub async fn list_documents(&self) -> Result<Vec<String>> {
        self.store.list_documents().await.map_err(PipelineError::Store)
    }

    /// Stored summary; `DocumentNotFound` when the document itself is unknown
    pub async fn stored_summary(&self, doc_id: &str) -> Result<Option<PolicySummary>> {
        self.load_document(doc_id).await?;
        self.store.get_summary(doc_id).await.map_err(PipelineError::Store)
    }

    pub async fn stored_evaluation(&self, doc_id: &str) -> Result<Option<EvaluationReport>> {
        self.load_document(doc_id).await?;
        self.store
            .get_evaluation(doc_id)
            .await
            .map_err(PipelineError::Store)
    }

    /// Evaluates the stored summary against the stored document and
    /// replaces any previous report.
    pub async fn evaluate(&self, doc_id: &str) -> Result<EvaluationReport> {
        let record = self.load_document(doc_id).await?;
        let summary = self
            .store
            .get_summary(doc_id)
            .await
            .map_err(PipelineError::Store)?;

        let report = self
            .evaluator
            .evaluate(doc_id, summary.as_ref(), &record.pages, &record.units);

        self.store
            .put_evaluation(&report)
            .await
            .map_err(PipelineError::Store)?;
        Ok(report)
    }
}
