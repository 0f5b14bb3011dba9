//! Grounding Engine - Deterministic grounding and evaluation for insurance policy documents
//!
//! This crate provides:
//! - Page cleaning and sentence-aware chunking into citable units
//! - Citation validation with pluggable contradiction checks
//! - Confidence scoring and Q&A interaction classification
//! - Summary evaluation (faithfulness, completeness, simplicity)
//! - Retrieval, generation and storage collaborator traits with local implementations
//! - Async orchestration of ingest, summary, Q&A and evaluation

pub mod cache;
pub mod chunker;
pub mod classifier;
pub mod cleaning;
pub mod collaborators;
pub mod confidence;
pub mod config;
pub mod contradiction;
pub mod error;
pub mod evaluation;
pub mod pipeline;
pub mod prompts;
pub mod retrieval;
pub mod sections;
pub mod store;
pub mod terminology;
pub mod text;
pub mod validator;

// Re-export commonly used types
pub use cache::{CachedDocumentStore, DocumentCache, DocumentSnapshot};
pub use chunker::Chunker;
pub use classifier::{InteractionClassifier, Route};
pub use collaborators::{DocumentStore, GenerationMode, GenerationRequest, Generator, RetrievedUnit, Retriever};
pub use confidence::ConfidenceScorer;
pub use config::EngineConfig;
pub use contradiction::{CompositeContradictionCheck, ContradictionCheck, NegationConflictCheck, NumericConflictCheck};
pub use error::{ConfigError, IngestError, PipelineError, StoreError};
pub use evaluation::Evaluator;
pub use pipeline::{DetailLevel, Engine};
pub use retrieval::LexicalRetriever;
pub use sections::CanonicalSection;
pub use store::{FsDocumentStore, InMemoryDocumentStore};
pub use terminology::TermNormalizer;
pub use validator::{CitationValidator, UnitIndex, ValidationOutcome};
