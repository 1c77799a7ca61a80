//! Embedding generation.
//!
//! [`EmbeddingGenerator`] turns an owner record into a stored embedding:
//! look up the owner, build its canonical text, call the embedding
//! provider once, and insert the vector into the family's store.
//!
//! # Batch semantics
//!
//! [`embed_batch`](EmbeddingGenerator::embed_batch) walks incident ids,
//! then fragment ids, strictly in order. A missing owner is skipped (the
//! id list may be stale). Any other failure stops the batch at once and
//! is returned as-is; the partial count is discarded and nothing after
//! the failing id is written.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{RecallError, StoreError};
use crate::models::{OwnerFamily, SourceType};
use crate::repository::{FragmentRepository, IncidentRepository};
use crate::store::EmbeddingStore;
use crate::text::{fragment_embedding_text, incident_embedding_text};

/// Builds and persists embeddings for incidents and runbook fragments.
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    incidents: Arc<dyn IncidentRepository>,
    fragments: Arc<dyn FragmentRepository>,
    incident_store: Arc<dyn EmbeddingStore>,
    fragment_store: Arc<dyn EmbeddingStore>,
}

impl EmbeddingGenerator {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        incidents: Arc<dyn IncidentRepository>,
        fragments: Arc<dyn FragmentRepository>,
        incident_store: Arc<dyn EmbeddingStore>,
        fragment_store: Arc<dyn EmbeddingStore>,
    ) -> Self {
        Self {
            provider,
            incidents,
            fragments,
            incident_store,
            fragment_store,
        }
    }

    /// Embed an incident, tagged [`SourceType::RawIncident`]. Returns `1`.
    ///
    /// # Errors
    ///
    /// - [`RecallError::Unexpected`]: no incident with this id.
    /// - [`RecallError::InvalidText`]: title and description are both blank.
    /// - [`RecallError::EmbeddingFailed`]: the provider failed, or the store
    ///   failed for a reason other than a constraint.
    /// - [`RecallError::PersistenceError`]: the store rejected the row on a
    ///   constraint.
    pub async fn embed_incident(&self, owner_id: i64) -> Result<usize, RecallError> {
        self.embed_incident_as(owner_id, SourceType::RawIncident)
            .await
    }

    /// Embed an incident with an explicit provenance tag, e.g.
    /// [`SourceType::VerifiedDiagnosis`] once its diagnosis is confirmed.
    pub async fn embed_incident_as(
        &self,
        owner_id: i64,
        source_type: SourceType,
    ) -> Result<usize, RecallError> {
        let incident = self
            .incidents
            .find_by_id(owner_id)
            .await
            .map_err(|e| {
                RecallError::EmbeddingFailed(format!("failed to load incident {}: {}", owner_id, e))
            })?
            .ok_or_else(|| RecallError::Unexpected(format!("incident {} not found", owner_id)))?;

        let text = incident_embedding_text(&incident).ok_or_else(|| {
            RecallError::InvalidText(format!(
                "incident {} has a blank title and description",
                owner_id
            ))
        })?;

        self.embed_and_store(self.incident_store.as_ref(), owner_id, &text, source_type)
            .await
    }

    /// Embed a runbook fragment, tagged [`SourceType::OfficialRunbook`].
    /// Returns `1`. Errors mirror [`embed_incident`](Self::embed_incident).
    pub async fn embed_runbook_fragment(&self, owner_id: i64) -> Result<usize, RecallError> {
        let fragment = self
            .fragments
            .find_by_id(owner_id)
            .await
            .map_err(|e| {
                RecallError::EmbeddingFailed(format!(
                    "failed to load runbook fragment {}: {}",
                    owner_id, e
                ))
            })?
            .ok_or_else(|| {
                RecallError::Unexpected(format!("runbook fragment {} not found", owner_id))
            })?;

        let text = fragment_embedding_text(&fragment).ok_or_else(|| {
            RecallError::InvalidText(format!(
                "runbook fragment {} has a blank title and content",
                owner_id
            ))
        })?;

        self.embed_and_store(
            self.fragment_store.as_ref(),
            owner_id,
            &text,
            OwnerFamily::Fragment.default_source_type(),
        )
        .await
    }

    /// Embed every listed incident, then every listed fragment.
    ///
    /// Returns the number of embeddings written. Missing owners are
    /// skipped; the first other failure aborts the batch.
    pub async fn embed_batch(
        &self,
        incident_ids: &[i64],
        fragment_ids: &[i64],
    ) -> Result<usize, RecallError> {
        let mut embedded = 0usize;
        let mut skipped = 0usize;

        for &id in incident_ids {
            match self.embed_incident(id).await {
                Ok(n) => embedded += n,
                Err(e) if e.is_owner_missing() => {
                    warn!(incident_id = id, "skipping stale incident id: {}", e);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        for &id in fragment_ids {
            match self.embed_runbook_fragment(id).await {
                Ok(n) => embedded += n,
                Err(e) if e.is_owner_missing() => {
                    warn!(fragment_id = id, "skipping stale fragment id: {}", e);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(embedded, skipped, "embedding batch complete");
        Ok(embedded)
    }

    async fn embed_and_store(
        &self,
        store: &dyn EmbeddingStore,
        owner_id: i64,
        text: &str,
        source_type: SourceType,
    ) -> Result<usize, RecallError> {
        let vector = embed_checked(self.provider.as_ref(), text)
            .await
            .map_err(RecallError::EmbeddingFailed)?;

        let record = store
            .insert(owner_id, text, &vector, source_type)
            .await
            .map_err(|e| insert_error(store.family(), owner_id, e))?;

        debug!(
            family = %store.family(),
            owner_id,
            embedding_id = record.id,
            source_type = %source_type,
            dims = vector.len(),
            "stored embedding"
        );
        Ok(1)
    }
}

/// Call the provider once and sanity-check the vector it returns.
///
/// An empty vector, one whose length disagrees with the provider's
/// declared dimension, or one with a NaN or infinite component counts as
/// a model failure.
pub(crate) async fn embed_checked(
    provider: &dyn EmbeddingProvider,
    text: &str,
) -> Result<Vec<f32>, String> {
    let vector = provider
        .embed(text)
        .await
        .map_err(|e| format!("{} ({})", e, provider.model_name()))?;
    if vector.is_empty() {
        return Err(format!("{} returned an empty vector", provider.model_name()));
    }
    let dims = provider.dims();
    if dims > 0 && vector.len() != dims {
        return Err(format!(
            "{} returned {} dimensions, expected {}",
            provider.model_name(),
            vector.len(),
            dims
        ));
    }
    if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
        return Err(format!(
            "{} returned a non-finite value at component {}",
            provider.model_name(),
            index
        ));
    }
    Ok(vector)
}

fn insert_error(family: OwnerFamily, owner_id: i64, err: StoreError) -> RecallError {
    if err.is_constraint_violation() {
        RecallError::PersistenceError(err.to_string())
    } else {
        RecallError::EmbeddingFailed(format!(
            "could not store embedding for {} {}: {}",
            family, owner_id, err
        ))
    }
}
