//! Application state for the policy API
//!
//! Holds the configured engine with its store, retriever and generator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use grounding_engine::{
    CachedDocumentStore, DocumentCache, DocumentStore, Engine, EngineConfig, FsDocumentStore,
    Generator, LexicalRetriever,
};
use tracing::{debug, info};

use crate::llm::OpenAiGenerator;

/// Settings needed to assemble the engine
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub data_dir: PathBuf,
    pub engine_config: Option<PathBuf>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_timeout: Duration,
}

/// Shared application state
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    /// Builds the production stack: filesystem store behind the document
    /// cache, lexical retrieval and an OpenAI-compatible generator.
    pub async fn new(config: &StateConfig) -> Result<Self> {
        let engine_config = match &config.engine_config {
            Some(path) => {
                info!("Loading engine config from {}", path.display());
                EngineConfig::from_file(path)?
            }
            None => EngineConfig::default(),
        };

        let fs_store = FsDocumentStore::open(&config.data_dir)
            .await
            .with_context(|| format!("Failed to open data dir {}", config.data_dir.display()))?;
        info!("Document store: {}", fs_store.root().display());
        let cache = Arc::new(DocumentCache::default());
        spawn_cache_purge(Arc::clone(&cache));
        let store: Arc<dyn DocumentStore> =
            Arc::new(CachedDocumentStore::with_shared_cache(fs_store, cache));

        let generator = OpenAiGenerator::new(
            &config.llm_base_url,
            &config.llm_model,
            config.llm_api_key.clone(),
            config.llm_timeout,
        )?;
        if config.llm_api_key.is_none() {
            info!("No LLM API key configured; generation requests will fail");
        }

        Self::with_collaborators(engine_config, store, Arc::new(generator))
    }

    /// State over any store and generator; retrieval is lexical over the store
    pub fn with_collaborators(
        config: EngineConfig,
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let retriever = Arc::new(LexicalRetriever::new(Arc::clone(&store)));
        let engine = Engine::new(config, store, retriever, generator)
            .context("Invalid engine configuration")?;
        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}

/// Drops expired and entry-less cache slots once per TTL
fn spawn_cache_purge(cache: Arc<DocumentCache>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cache.ttl());
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = cache.purge_expired().await;
            if purged > 0 {
                debug!(purged, "Purged document cache slots");
            }
        }
    });
}
