//! Per-document cache of units and summary
//!
//! Entries are immutable [`DocumentSnapshot`]s swapped in whole, so a reader
//! sees either the old snapshot or the new one. Generations come from one
//! counter that every write bumps; a document's generation is the value
//! stamped by its last write, or the counter itself when the cache holds no
//! slot for it. A loader records the generation before reading from the
//! store and may only insert if it is still current, which keeps a slow
//! reader from re-caching data that a concurrent write already replaced.
//! Slots without a live entry are dropped by [`DocumentCache::purge_expired`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use policy_types::{DocumentRecord, EvaluationReport, PolicySummary};
use tokio::sync::RwLock;
use tracing::debug;

use crate::collaborators::DocumentStore;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Store reads retried while writes keep moving the generation
const SNAPSHOT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    /// Generation the snapshot was loaded at
    pub version: u64,
    pub document: Arc<DocumentRecord>,
    pub summary: Option<Arc<PolicySummary>>,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    entry: Option<(Instant, Arc<DocumentSnapshot>)>,
}

impl Slot {
    fn is_live(&self, ttl: Duration) -> bool {
        matches!(&self.entry, Some((inserted, _)) if inserted.elapsed() < ttl)
    }
}

#[derive(Debug, Default)]
struct Slots {
    counter: u64,
    by_doc: HashMap<String, Slot>,
}

impl Slots {
    fn generation(&self, doc_id: &str) -> u64 {
        self.by_doc
            .get(doc_id)
            .map(|s| s.generation)
            .unwrap_or(self.counter)
    }
}

#[derive(Debug)]
pub struct DocumentCache {
    ttl: Duration,
    slots: RwLock<Slots>,
}

impl DocumentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: RwLock::new(Slots::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live snapshot for `doc_id`, if any. An expired entry is evicted.
    pub async fn get(&self, doc_id: &str) -> Option<Arc<DocumentSnapshot>> {
        {
            let slots = self.slots.read().await;
            let slot = slots.by_doc.get(doc_id)?;
            if slot.is_live(self.ttl) {
                return slot.entry.as_ref().map(|(_, snapshot)| Arc::clone(snapshot));
            }
            if slot.entry.is_none() {
                return None;
            }
        }

        let mut slots = self.slots.write().await;
        if slots.by_doc.get(doc_id).is_some_and(|s| s.entry.is_some() && !s.is_live(self.ttl)) {
            slots.by_doc.remove(doc_id);
            debug!(doc_id, "Evicted expired cache entry");
        }
        None
    }

    pub async fn generation(&self, doc_id: &str) -> u64 {
        self.slots.read().await.generation(doc_id)
    }

    /// Stores a snapshot loaded at `generation`. Returns false, storing
    /// nothing, when a write has happened since.
    pub async fn insert(
        &self,
        doc_id: &str,
        generation: u64,
        document: Arc<DocumentRecord>,
        summary: Option<Arc<PolicySummary>>,
    ) -> bool {
        let mut slots = self.slots.write().await;
        let current = slots.generation(doc_id);
        if current != generation {
            debug!(doc_id, generation, current, "Rejected stale cache fill");
            return false;
        }
        let snapshot = DocumentSnapshot {
            version: generation,
            document,
            summary,
        };
        slots.by_doc.insert(
            doc_id.to_string(),
            Slot {
                generation,
                entry: Some((Instant::now(), Arc::new(snapshot))),
            },
        );
        true
    }

    /// Drops the entry and stamps a new generation
    pub async fn invalidate(&self, doc_id: &str) {
        let mut slots = self.slots.write().await;
        slots.counter += 1;
        let generation = slots.counter;
        slots.by_doc.insert(
            doc_id.to_string(),
            Slot {
                generation,
                entry: None,
            },
        );
        debug!(doc_id, generation, "Invalidated cache entry");
    }

    /// Forgets `doc_id` entirely. The counter still moves, so a fill that
    /// started before the removal cannot land afterwards.
    pub async fn remove(&self, doc_id: &str) {
        let mut slots = self.slots.write().await;
        slots.counter += 1;
        slots.by_doc.remove(doc_id);
        debug!(doc_id, generation = slots.counter, "Removed cache slot");
    }

    /// Drops every slot without a live entry; returns how many went
    pub async fn purge_expired(&self) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.by_doc.len();
        let ttl = self.ttl;
        slots.by_doc.retain(|_, slot| slot.is_live(ttl));
        before - slots.by_doc.len()
    }

    /// Number of tracked document slots
    pub async fn len(&self) -> usize {
        self.slots.read().await.by_doc.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// A [`DocumentStore`] that serves documents and summaries from a
/// [`DocumentCache`] and invalidates after every write.
pub struct CachedDocumentStore<S> {
    inner: S,
    cache: Arc<DocumentCache>,
}

impl<S: DocumentStore> CachedDocumentStore<S> {
    pub fn new(inner: S, cache: DocumentCache) -> Self {
        Self::with_shared_cache(inner, Arc::new(cache))
    }

    /// Store over a cache that other owners (a purge task) also hold
    pub fn with_shared_cache(inner: S, cache: Arc<DocumentCache>) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Cached view of the document and its summary.
    ///
    /// Document and summary are read separately from the inner store; the
    /// pair is only returned when no write landed between the two reads.
    pub async fn snapshot(&self, doc_id: &str) -> Result<Option<Arc<DocumentSnapshot>>> {
        if let Some(snapshot) = self.cache.get(doc_id).await {
            return Ok(Some(snapshot));
        }

        for attempt in 1..=SNAPSHOT_ATTEMPTS {
            let generation = self.cache.generation(doc_id).await;
            let Some(document) = self.inner.get_document(doc_id).await? else {
                return Ok(None);
            };
            let summary = self.inner.get_summary(doc_id).await?;

            if self.cache.generation(doc_id).await != generation {
                debug!(doc_id, attempt, "Document written during snapshot read, retrying");
                continue;
            }

            let snapshot = DocumentSnapshot {
                version: generation,
                document: Arc::new(document),
                summary: summary.map(Arc::new),
            };
            self.cache
                .insert(
                    doc_id,
                    generation,
                    Arc::clone(&snapshot.document),
                    snapshot.summary.clone(),
                )
                .await;
            return Ok(Some(Arc::new(snapshot)));
        }

        bail!(
            "document {} kept changing across {} snapshot reads",
            doc_id,
            SNAPSHOT_ATTEMPTS
        )
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for CachedDocumentStore<S> {
    async fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        let result = self.inner.put_document(record).await;
        self.cache.invalidate(&record.doc_id).await;
        result
    }

    async fn get_document(&self, doc_id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self
            .snapshot(doc_id)
            .await?
            .map(|s| s.document.as_ref().clone()))
    }

    async fn delete_document(&self, doc_id: &str) -> Result<bool> {
        let result = self.inner.delete_document(doc_id).await;
        self.cache.remove(doc_id).await;
        result
    }

    async fn put_summary(&self, doc_id: &str, summary: &PolicySummary) -> Result<()> {
        let result = self.inner.put_summary(doc_id, summary).await;
        self.cache.invalidate(doc_id).await;
        result
    }

    async fn get_summary(&self, doc_id: &str) -> Result<Option<PolicySummary>> {
        Ok(self
            .snapshot(doc_id)
            .await?
            .and_then(|s| s.summary.as_deref().cloned()))
    }

    async fn put_evaluation(&self, report: &EvaluationReport) -> Result<()> {
        self.inner.put_evaluation(report).await
    }

    async fn get_evaluation(&self, doc_id: &str) -> Result<Option<EvaluationReport>> {
        self.inner.get_evaluation(doc_id).await
    }

    async fn list_documents(&self) -> Result<Vec<String>> {
        self.inner.list_documents().await
    }
}
