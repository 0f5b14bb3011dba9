//! Document persistence
//!
//! Two [`DocumentStore`] implementations: an in-memory map for tests and
//! single-process use, and a filesystem layout with one directory per
//! document:
//!
//! ```text
//! <root>/<doc_id>/document.json
//! <root>/<doc_id>/summary.json
//! <root>/<doc_id>/evaluation.json
//! ```
//!
//! Every write replaces the whole record. Files are written to a temporary
//! sibling and renamed into place so readers never see a partial record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use policy_types::{DocumentRecord, EvaluationReport, PolicySummary};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::collaborators::DocumentStore;
use crate::error::StoreError;

const DOCUMENT_FILE: &str = "document.json";
const SUMMARY_FILE: &str = "summary.json";
const EVALUATION_FILE: &str = "evaluation.json";

/// Document ids become directory names, so they must be a single plain
/// path component.
pub fn validate_doc_id(doc_id: &str) -> std::result::Result<(), StoreError> {
    let ok = !doc_id.is_empty()
        && doc_id != "."
        && doc_id != ".."
        && doc_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidDocumentId(doc_id.to_string()))
    }
}

#[derive(Debug, Clone)]
struct StoredDocument {
    record: DocumentRecord,
    summary: Option<PolicySummary>,
    evaluation: Option<EvaluationReport>,
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, StoredDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        validate_doc_id(&record.doc_id)?;
        let mut documents = self.documents.write().await;
        // A new unit set invalidates everything derived from the old one
        documents.insert(
            record.doc_id.clone(),
            StoredDocument {
                record: record.clone(),
                summary: None,
                evaluation: None,
            },
        );
        Ok(())
    }

    async fn get_document(&self, doc_id: &str) -> Result<Option<DocumentRecord>> {
        let documents = self.documents.read().await;
        Ok(documents.get(doc_id).map(|d| d.record.clone()))
    }

    async fn delete_document(&self, doc_id: &str) -> Result<bool> {
        let mut documents = self.documents.write().await;
        Ok(documents.remove(doc_id).is_some())
    }

    async fn put_summary(&self, doc_id: &str, summary: &PolicySummary) -> Result<()> {
        let mut documents = self.documents.write().await;
        let stored = documents
            .get_mut(doc_id)
            .ok_or_else(|| StoreError::NotFound(doc_id.to_string()))?;
        stored.summary = Some(summary.clone());
        // An evaluation scores one particular summary
        stored.evaluation = None;
        Ok(())
    }

    async fn get_summary(&self, doc_id: &str) -> Result<Option<PolicySummary>> {
        let documents = self.documents.read().await;
        Ok(documents.get(doc_id).and_then(|d| d.summary.clone()))
    }

    async fn put_evaluation(&self, report: &EvaluationReport) -> Result<()> {
        let mut documents = self.documents.write().await;
        let stored = documents
            .get_mut(&report.doc_id)
            .ok_or_else(|| StoreError::NotFound(report.doc_id.clone()))?;
        stored.evaluation = Some(report.clone());
        Ok(())
    }

    async fn get_evaluation(&self, doc_id: &str) -> Result<Option<EvaluationReport>> {
        let documents = self.documents.read().await;
        Ok(documents.get(doc_id).and_then(|d| d.evaluation.clone()))
    }

    async fn list_documents(&self) -> Result<Vec<String>> {
        let documents = self.documents.read().await;
        let mut ids: Vec<String> = documents.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    /// Opens (and creates if needed) the data directory
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(StoreError::from)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_dir(&self, doc_id: &str) -> std::result::Result<PathBuf, StoreError> {
        validate_doc_id(doc_id)?;
        Ok(self.root.join(doc_id))
    }

    async fn write_json<T: Serialize>(path: &Path, value: &T) -> std::result::Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> std::result::Result<Option<T>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_if_present(path: &Path) -> std::result::Result<(), StoreError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn require_document(&self, doc_id: &str) -> std::result::Result<PathBuf, StoreError> {
        let dir = self.doc_dir(doc_id)?;
        if fs::try_exists(dir.join(DOCUMENT_FILE)).await? {
            Ok(dir)
        } else {
            Err(StoreError::NotFound(doc_id.to_string()))
        }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        let dir = self.doc_dir(&record.doc_id)?;
        fs::create_dir_all(&dir).await.map_err(StoreError::from)?;
        Self::write_json(&dir.join(DOCUMENT_FILE), record).await?;

        for derived in [SUMMARY_FILE, EVALUATION_FILE] {
            Self::remove_if_present(&dir.join(derived)).await?;
        }

        debug!(doc_id = %record.doc_id, units = record.units.len(), "Stored document");
        Ok(())
    }

    async fn get_document(&self, doc_id: &str) -> Result<Option<DocumentRecord>> {
        let dir = self.doc_dir(doc_id)?;
        Ok(Self::read_json(&dir.join(DOCUMENT_FILE)).await?)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<bool> {
        let dir = self.doc_dir(doc_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::from(e).into()),
        }
    }

    async fn put_summary(&self, doc_id: &str, summary: &PolicySummary) -> Result<()> {
        let dir = self.require_document(doc_id).await?;
        Self::remove_if_present(&dir.join(EVALUATION_FILE)).await?;
        Self::write_json(&dir.join(SUMMARY_FILE), summary).await?;
        Ok(())
    }

    async fn get_summary(&self, doc_id: &str) -> Result<Option<PolicySummary>> {
        let dir = self.doc_dir(doc_id)?;
        Ok(Self::read_json(&dir.join(SUMMARY_FILE)).await?)
    }

    async fn put_evaluation(&self, report: &EvaluationReport) -> Result<()> {
        let dir = self.require_document(&report.doc_id).await?;
        Self::write_json(&dir.join(EVALUATION_FILE), report).await?;
        Ok(())
    }

    async fn get_evaluation(&self, doc_id: &str) -> Result<Option<EvaluationReport>> {
        let dir = self.doc_dir(doc_id)?;
        Ok(Self::read_json(&dir.join(EVALUATION_FILE)).await?)
    }

    async fn list_documents(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(StoreError::from)?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(StoreError::from)? {
            let path = entry.path();
            if fs::try_exists(path.join(DOCUMENT_FILE)).await.unwrap_or(false) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
