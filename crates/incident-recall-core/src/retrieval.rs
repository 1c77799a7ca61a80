//! Similarity retrieval for the diagnosis step.
//!
//! [`RetrievalService`] embeds a candidate record's query text once,
//! searches both embedding stores concurrently, and assembles a
//! [`RetrievalContext`].
//!
//! # Pipeline
//!
//! 1. Build query text from the candidate (blank → `InvalidQuery`).
//! 2. Embed it with the provider (failure → `ModelUnavailable`).
//! 3. `find_similar` on the incident store and the fragment store, each
//!    with the call site's `(min_score, limit)` pair (failure → `SearchFailed`).
//! 4. Project hits to [`RetrievalMatch`]es with bounded snippets.
//! 5. Apply the provenance boost, if configured, and re-sort.
//!
//! No state is kept between calls.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{RecallError, StoreError};
use crate::generation::embed_checked;
use crate::models::{
    FragmentCandidate, IncidentCandidate, RetrievalContext, RetrievalMatch, ScoredRecord,
    SourceType,
};
use crate::store::EmbeddingStore;
use crate::text::{fragment_query_text, incident_query_text, truncate_snippet};

/// Threshold and top-K for one store query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchLimits {
    pub min_score: f64,
    pub limit: usize,
}

impl SearchLimits {
    pub const fn new(min_score: f64, limit: usize) -> Self {
        Self { min_score, limit }
    }
}

/// The store queries one retrieval call site makes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallSiteLimits {
    pub incidents: SearchLimits,
    pub fragments: SearchLimits,
}

impl Default for CallSiteLimits {
    fn default() -> Self {
        Self {
            incidents: SearchLimits::new(0.7, 5),
            fragments: SearchLimits::new(0.6, 15),
        }
    }
}

/// Per-provenance score multipliers applied after the store search.
///
/// Tags without an entry keep a factor of `1.0`. An empty boost is the
/// identity and skips the stage entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceBoost {
    factors: HashMap<SourceType, f64>,
}

impl ProvenanceBoost {
    pub fn new(factors: impl IntoIterator<Item = (SourceType, f64)>) -> Self {
        Self {
            factors: factors
                .into_iter()
                .filter(|(_, f)| (*f - 1.0).abs() > f64::EPSILON)
                .collect(),
        }
    }

    pub fn factor(&self, source_type: SourceType) -> f64 {
        self.factors.get(&source_type).copied().unwrap_or(1.0)
    }

    pub fn is_identity(&self) -> bool {
        self.factors.is_empty()
    }

    /// Multiply each score by its tag's factor, clamp to `[-1, 1]`, and
    /// re-sort descending. Equal scores keep their previous order.
    pub fn apply(&self, matches: &mut [RetrievalMatch]) {
        if self.is_identity() {
            return;
        }
        for m in matches.iter_mut() {
            m.score = (m.score * self.factor(m.source_type)).clamp(-1.0, 1.0);
        }
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalParams {
    /// Store queries made by [`RetrievalService::retrieve_for_incident`].
    pub for_incident: CallSiteLimits,
    /// Store queries made by [`RetrievalService::retrieve_for_fragment`].
    pub for_fragment: CallSiteLimits,
    /// Maximum snippet length in characters.
    pub snippet_chars: usize,
    #[serde(default)]
    pub boost: ProvenanceBoost,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            for_incident: CallSiteLimits::default(),
            for_fragment: CallSiteLimits::default(),
            snippet_chars: 300,
            boost: ProvenanceBoost::default(),
        }
    }
}

/// Finds prior incidents and runbook fragments similar to a candidate.
pub struct RetrievalService {
    provider: Arc<dyn EmbeddingProvider>,
    incident_store: Arc<dyn EmbeddingStore>,
    fragment_store: Arc<dyn EmbeddingStore>,
    params: RetrievalParams,
}

impl RetrievalService {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        incident_store: Arc<dyn EmbeddingStore>,
        fragment_store: Arc<dyn EmbeddingStore>,
        params: RetrievalParams,
    ) -> Self {
        Self {
            provider,
            incident_store,
            fragment_store,
            params,
        }
    }

    /// Retrieve context for an incident-shaped candidate.
    ///
    /// # Errors
    ///
    /// - [`RecallError::InvalidQuery`]: title and description both blank.
    /// - [`RecallError::ModelUnavailable`]: the provider failed.
    /// - [`RecallError::SearchFailed`]: either store search failed.
    pub async fn retrieve_for_incident(
        &self,
        candidate: &IncidentCandidate,
    ) -> Result<RetrievalContext, RecallError> {
        let query_text = incident_query_text(candidate).ok_or_else(|| {
            RecallError::InvalidQuery("incident title and description are blank".to_string())
        })?;
        self.retrieve(query_text, self.params.for_incident).await
    }

    /// Retrieve context for a fragment-shaped candidate. Errors mirror
    /// [`retrieve_for_incident`](Self::retrieve_for_incident).
    pub async fn retrieve_for_fragment(
        &self,
        candidate: &FragmentCandidate,
    ) -> Result<RetrievalContext, RecallError> {
        let query_text = fragment_query_text(candidate).ok_or_else(|| {
            RecallError::InvalidQuery("fragment title and content are blank".to_string())
        })?;
        self.retrieve(query_text, self.params.for_fragment).await
    }

    async fn retrieve(
        &self,
        query_text: String,
        limits: CallSiteLimits,
    ) -> Result<RetrievalContext, RecallError> {
        let query = embed_checked(self.provider.as_ref(), &query_text)
            .await
            .map_err(RecallError::ModelUnavailable)?;

        let (incident_hits, fragment_hits) = futures::future::join(
            self.incident_store.find_similar(
                &query,
                limits.incidents.min_score,
                limits.incidents.limit,
            ),
            self.fragment_store.find_similar(
                &query,
                limits.fragments.min_score,
                limits.fragments.limit,
            ),
        )
        .await;
        let incident_hits = incident_hits.map_err(search_error)?;
        let fragment_hits = fragment_hits.map_err(search_error)?;

        debug!(
            incident_hits = incident_hits.len(),
            fragment_hits = fragment_hits.len(),
            "retrieval complete"
        );

        Ok(RetrievalContext {
            similar_incident_matches: self.to_matches(incident_hits),
            similar_fragment_matches: self.to_matches(fragment_hits),
            query_text,
        })
    }

    fn to_matches(&self, hits: Vec<ScoredRecord>) -> Vec<RetrievalMatch> {
        let mut matches: Vec<RetrievalMatch> = hits
            .into_iter()
            .map(|hit| RetrievalMatch {
                owner_id: hit.record.owner_id,
                score: hit.score,
                snippet: truncate_snippet(&hit.record.source_text, self.params.snippet_chars),
                source_type: hit.record.source_type,
            })
            .collect();
        self.params.boost.apply(&mut matches);
        matches
    }
}

fn search_error(err: StoreError) -> RecallError {
    match err {
        StoreError::MalformedVector(e) => RecallError::MalformedVector(e),
        other => RecallError::SearchFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OwnerFamily;
    use crate::store::memory::InMemoryEmbeddingStore;
    use anyhow::bail;
    use async_trait::async_trait;

    /// Maps text onto two axes: "database" words and "disk" words.
    struct AxisProvider {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for AxisProvider {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            if self.fail {
                bail!("connection refused");
            }
            let lower = text.to_lowercase();
            let db = lower.matches("database").count() as f32;
            let disk = lower.matches("disk").count() as f32;
            Ok(vec![db, disk])
        }
    }

    async fn seeded_stores() -> (Arc<InMemoryEmbeddingStore>, Arc<InMemoryEmbeddingStore>) {
        let incidents = Arc::new(InMemoryEmbeddingStore::new(OwnerFamily::Incident));
        incidents
            .insert(1, "database down", &[1.0, 0.0], SourceType::RawIncident)
            .await
            .unwrap();
        incidents
            .insert(2, "disk full", &[0.0, 1.0], SourceType::RawIncident)
            .await
            .unwrap();
        incidents
            .insert(3, "database disk", &[1.0, 0.2], SourceType::VerifiedDiagnosis)
            .await
            .unwrap();

        let fragments = Arc::new(InMemoryEmbeddingStore::new(OwnerFamily::Fragment));
        fragments
            .insert(
                10,
                &"restart the database ".repeat(50),
                &[1.0, 0.1],
                SourceType::OfficialRunbook,
            )
            .await
            .unwrap();
        (incidents, fragments)
    }

    fn service(
        fail: bool,
        incidents: Arc<InMemoryEmbeddingStore>,
        fragments: Arc<InMemoryEmbeddingStore>,
        params: RetrievalParams,
    ) -> RetrievalService {
        RetrievalService::new(Arc::new(AxisProvider { fail }), incidents, fragments, params)
    }

    fn candidate(title: &str, description: &str) -> IncidentCandidate {
        IncidentCandidate {
            title: title.to_string(),
            description: description.to_string(),
            severity: Some("HIGH".to_string()),
            status: None,
        }
    }

    #[tokio::test]
    async fn ranks_both_families() {
        let (incidents, fragments) = seeded_stores().await;
        let svc = service(false, incidents, fragments, RetrievalParams::default());
        let ctx = svc
            .retrieve_for_incident(&candidate("Database issue", "database errors"))
            .await
            .unwrap();

        let owners: Vec<i64> = ctx.similar_incident_matches.iter().map(|m| m.owner_id).collect();
        assert_eq!(owners, vec![1, 3]);
        assert!(ctx.similar_incident_matches.iter().all(|m| m.score >= 0.7));
        assert_eq!(ctx.similar_fragment_matches.len(), 1);
        assert!(ctx.query_text.ends_with("Severity: HIGH"));
    }

    #[tokio::test]
    async fn snippets_are_bounded() {
        let (incidents, fragments) = seeded_stores().await;
        let params = RetrievalParams {
            snippet_chars: 40,
            ..RetrievalParams::default()
        };
        let svc = service(false, incidents, fragments, params);
        let ctx = svc
            .retrieve_for_incident(&candidate("database", ""))
            .await
            .unwrap();
        let snippet = &ctx.similar_fragment_matches[0].snippet;
        assert!(snippet.chars().count() <= 43);
        assert!(snippet.ends_with("..."));
    }

    #[tokio::test]
    async fn per_call_site_limits_apply() {
        let (incidents, fragments) = seeded_stores().await;
        let params = RetrievalParams {
            for_fragment: CallSiteLimits {
                incidents: SearchLimits::new(-1.0, 1),
                fragments: SearchLimits::new(0.999, 5),
            },
            ..RetrievalParams::default()
        };
        let svc = service(false, incidents, fragments, params);
        let ctx = svc
            .retrieve_for_fragment(&FragmentCandidate {
                title: "database".to_string(),
                content: "restart".to_string(),
                tags: vec![],
            })
            .await
            .unwrap();
        assert_eq!(ctx.similar_incident_matches.len(), 1);
        assert_eq!(ctx.similar_incident_matches[0].owner_id, 1);
        assert!(ctx.similar_fragment_matches.is_empty());
    }

    #[tokio::test]
    async fn blank_candidate_is_invalid_query() {
        let (incidents, fragments) = seeded_stores().await;
        let svc = service(false, incidents, fragments, RetrievalParams::default());
        let err = svc
            .retrieve_for_incident(&candidate(" ", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn provider_failure_is_model_unavailable() {
        let (incidents, fragments) = seeded_stores().await;
        let svc = service(true, incidents, fragments, RetrievalParams::default());
        let err = svc
            .retrieve_for_incident(&candidate("database", "down"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn store_failure_is_search_failed() {
        let (incidents, _) = seeded_stores().await;
        let wide = Arc::new(InMemoryEmbeddingStore::new(OwnerFamily::Fragment));
        wide.insert(1, "x", &[1.0, 0.0, 0.0], SourceType::OfficialRunbook)
            .await
            .unwrap();
        let svc = service(false, incidents, wide, RetrievalParams::default());
        let err = svc
            .retrieve_for_incident(&candidate("database", "down"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::SearchFailed(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn boost_reorders_by_provenance() {
        let (incidents, fragments) = seeded_stores().await;
        let params = RetrievalParams {
            boost: ProvenanceBoost::new([(SourceType::RawIncident, 0.9)]),
            ..RetrievalParams::default()
        };
        let svc = service(false, incidents, fragments, params);
        let ctx = svc
            .retrieve_for_incident(&candidate("database", "database"))
            .await
            .unwrap();
        let owners: Vec<i64> = ctx.similar_incident_matches.iter().map(|m| m.owner_id).collect();
        assert_eq!(owners, vec![3, 1]);
        assert!((ctx.similar_incident_matches[1].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn identity_boost_is_skipped() {
        let boost = ProvenanceBoost::new([(SourceType::RawIncident, 1.0)]);
        assert!(boost.is_identity());
        assert_eq!(boost.factor(SourceType::CommunityNote), 1.0);
    }
}
