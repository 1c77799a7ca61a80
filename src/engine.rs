//! Wiring of the retrieval engine over one SQLite database.
//!
//! [`Engine::open`] connects the pool, picks the configured search
//! strategy, builds both embedding stores and the configured provider,
//! and hands them to the core generation and retrieval services.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use incident_recall_core::embedding::EmbeddingProvider;
use incident_recall_core::{EmbeddingGenerator, OwnerFamily, RetrievalService};

use crate::config::{Config, SearchStrategy};
use crate::db;
use crate::embedding::create_provider;
use crate::repository::{SqliteFragments, SqliteIncidents};
use crate::searcher::{searcher_for, NativeSearcher};
use crate::sqlite_store::SqliteEmbeddingStore;

pub struct Engine {
    pub pool: SqlitePool,
    pub incidents: Arc<SqliteIncidents>,
    pub fragments: Arc<SqliteFragments>,
    pub incident_store: Arc<SqliteEmbeddingStore>,
    pub fragment_store: Arc<SqliteEmbeddingStore>,
    pub generator: EmbeddingGenerator,
    pub retrieval: RetrievalService,
}

impl Engine {
    /// Open the engine with the provider named in `config.embedding`.
    pub async fn open(config: &Config) -> Result<Self> {
        let provider = create_provider(&config.embedding)?;
        Self::with_provider(config, provider).await
    }

    /// Open the engine with an explicit provider.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened, if the retrieval config is
    /// invalid, or if the native strategy is configured but sqlite-vec is
    /// not loaded.
    pub async fn with_provider(
        config: &Config,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let pool = db::connect(config).await?;

        if config.search.strategy == SearchStrategy::Native {
            let version = NativeSearcher::probe(&pool)
                .await
                .context("search.strategy = \"native\" requires sqlite-vec")?;
            debug!(%version, "sqlite-vec loaded");
        }

        let searcher = searcher_for(config.search.strategy);
        let incident_store = Arc::new(SqliteEmbeddingStore::new(
            pool.clone(),
            OwnerFamily::Incident,
            Arc::clone(&searcher),
        ));
        let fragment_store = Arc::new(SqliteEmbeddingStore::new(
            pool.clone(),
            OwnerFamily::Fragment,
            searcher,
        ));
        let incidents = Arc::new(SqliteIncidents::new(pool.clone()));
        let fragments = Arc::new(SqliteFragments::new(pool.clone()));

        let generator = EmbeddingGenerator::new(
            Arc::clone(&provider),
            incidents.clone(),
            fragments.clone(),
            incident_store.clone(),
            fragment_store.clone(),
        );
        let retrieval = RetrievalService::new(
            provider,
            incident_store.clone(),
            fragment_store.clone(),
            config.retrieval.to_params()?,
        );

        Ok(Self {
            pool,
            incidents,
            fragments,
            incident_store,
            fragment_store,
            generator,
            retrieval,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
