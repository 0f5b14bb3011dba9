//! Error types for the grounding engine

use thiserror::Error;

/// Input errors raised while turning pages into units
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngestError {
    #[error("Document has no pages")]
    NoPages,

    #[error("Document has no extractable text")]
    NoExtractableText,

    #[error("Document produced no units")]
    NoUnits,

    #[error("Page numbers are 1-based, got {0}")]
    InvalidPageNumber(u32),

    #[error("Page {0} appears more than once")]
    DuplicatePage(u32),

    /// The keyword gate rejected the upload
    #[error("Document does not appear to be a health insurance policy ({found} of {required} policy keywords found)")]
    NotAPolicy { found: usize, required: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid chunk bounds: min {min}, target {target}, max {max}")]
    ChunkBounds {
        min: usize,
        target: usize,
        max: usize,
    },

    #[error("Overlap of {overlap} tokens must be below max_tokens {max}")]
    OverlapTooLarge { overlap: usize, max: usize },

    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: String, value: f64 },

    #[error("Bullet bounds are inconsistent")]
    BulletBounds,

    #[error("Unknown section in configuration: {0}")]
    UnknownSection(String),

    #[error("No completeness weight for section: {0}")]
    MissingWeight(String),

    #[error("Weight for section {section} must be a non-negative number, got {value}")]
    InvalidWeight { section: String, value: f64 },

    #[error("Section weights must sum to 1.0, got {0}")]
    WeightSum(f64),

    #[error("Checklist for section {0} is empty")]
    EmptyChecklist(String),

    #[error("Checklist item {0} has no keywords")]
    EmptyChecklistItem(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the async pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Storage error: {0:#}")]
    Store(anyhow::Error),

    #[error("Retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),

    #[error("Generation failed: {0:#}")]
    Generation(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
