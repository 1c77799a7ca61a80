//! In-memory [`EmbeddingStore`] implementation for tests and embedding
//! callers that do not need persistence.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`, in insertion
//! order. Similarity search is [`rank_by_similarity`] over all of them.

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StoreError;
use crate::models::{EmbeddingRecord, OwnerFamily, ScoredRecord, SourceType};

use super::{check_dimensions, check_finite, rank_by_similarity, EmbeddingStore};

/// In-memory embedding store.
///
/// By default any owner id is accepted. Call [`with_owners`](Self::with_owners)
/// to make `insert` reject owners outside a known set, mirroring a
/// foreign-key constraint.
pub struct InMemoryEmbeddingStore {
    family: OwnerFamily,
    records: RwLock<Vec<EmbeddingRecord>>,
    next_id: RwLock<i64>,
    owners: RwLock<Option<HashSet<i64>>>,
}

impl InMemoryEmbeddingStore {
    pub fn new(family: OwnerFamily) -> Self {
        Self {
            family,
            records: RwLock::new(Vec::new()),
            next_id: RwLock::new(1),
            owners: RwLock::new(None),
        }
    }

    /// Only accept inserts for these owner ids.
    pub fn with_owners(self, owners: impl IntoIterator<Item = i64>) -> Self {
        *self.owners.write().unwrap_or_else(PoisonError::into_inner) =
            Some(owners.into_iter().collect());
        self
    }

    /// Delete an owner and cascade to its embeddings. Returns the number
    /// of embeddings removed.
    pub fn remove_owner(&self, owner_id: i64) -> usize {
        if let Some(owners) = self
            .owners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            owners.remove(&owner_id);
        }
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|r| r.owner_id != owner_id);
        before - records.len()
    }

    /// All records for one owner, in insertion order.
    pub fn records_for(&self, owner_id: i64) -> Vec<EmbeddingRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect()
    }

    fn owner_exists(&self, owner_id: i64) -> bool {
        match &*self.owners.read().unwrap_or_else(PoisonError::into_inner) {
            Some(owners) => owners.contains(&owner_id),
            None => true,
        }
    }
}

#[async_trait]
impl EmbeddingStore for InMemoryEmbeddingStore {
    fn family(&self) -> OwnerFamily {
        self.family
    }

    async fn insert(
        &self,
        owner_id: i64,
        source_text: &str,
        vector: &[f32],
        source_type: SourceType,
    ) -> Result<EmbeddingRecord, StoreError> {
        if !self.owner_exists(owner_id) {
            return Err(StoreError::OwnerNotFound {
                family: self.family,
                owner_id,
            });
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let expected = records.first().map_or(vector.len(), |r| r.vector.len());
        check_dimensions(expected, vector.len())?;
        check_finite(vector)?;

        let mut next_id = self.next_id.write().unwrap_or_else(PoisonError::into_inner);
        let record = EmbeddingRecord {
            id: *next_id,
            owner_id,
            source_text: source_text.to_string(),
            vector: vector.to_vec(),
            created_at: Utc::now(),
            source_type,
        };
        *next_id += 1;
        records.push(record.clone());
        Ok(record)
    }

    async fn find_similar(
        &self,
        query: &[f32],
        min_score: f64,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let snapshot = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        rank_by_similarity(snapshot, query, min_score, limit)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len() as u64)
    }

    async fn count_by_source_type(&self) -> Result<Vec<(SourceType, u64)>, StoreError> {
        let mut counts: BTreeMap<SourceType, u64> = BTreeMap::new();
        for record in self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            *counts.entry(record.source_type).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = InMemoryEmbeddingStore::new(OwnerFamily::Incident);
        let a = store
            .insert(1, "first", &[1.0, 0.0], SourceType::RawIncident)
            .await
            .unwrap();
        let b = store
            .insert(1, "second", &[0.0, 1.0], SourceType::RawIncident)
            .await
            .unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.records_for(1).len(), 2);
    }

    #[tokio::test]
    async fn insert_rejects_unknown_owner() {
        let store = InMemoryEmbeddingStore::new(OwnerFamily::Fragment).with_owners([1, 2]);
        let err = store
            .insert(3, "orphan", &[1.0], SourceType::OfficialRunbook)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::OwnerNotFound {
                family: OwnerFamily::Fragment,
                owner_id: 3
            }
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_rejects_dimension_change() {
        let store = InMemoryEmbeddingStore::new(OwnerFamily::Incident);
        store
            .insert(1, "a", &[1.0, 0.0], SourceType::RawIncident)
            .await
            .unwrap();
        let err = store
            .insert(2, "b", &[1.0, 0.0, 0.0], SourceType::RawIncident)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn insert_rejects_non_finite_vector() {
        let store = InMemoryEmbeddingStore::new(OwnerFamily::Incident);
        let err = store
            .insert(1, "a", &[f32::NAN, 1.0], SourceType::RawIncident)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NonFiniteVector { index: 0 }));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_owner_cascades() {
        let store = InMemoryEmbeddingStore::new(OwnerFamily::Incident).with_owners([1, 2]);
        store
            .insert(1, "a", &[1.0, 0.0], SourceType::RawIncident)
            .await
            .unwrap();
        store
            .insert(2, "b", &[0.0, 1.0], SourceType::RawIncident)
            .await
            .unwrap();
        assert_eq!(store.remove_owner(1), 1);
        let hits = store.find_similar(&[1.0, 0.0], -1.0, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.owner_id, 2);
        assert!(store
            .insert(1, "again", &[1.0, 0.0], SourceType::RawIncident)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn counts_by_source_type_and_clears() {
        let store = InMemoryEmbeddingStore::new(OwnerFamily::Incident);
        for (owner, tag) in [
            (1, SourceType::RawIncident),
            (2, SourceType::VerifiedDiagnosis),
            (3, SourceType::RawIncident),
        ] {
            store.insert(owner, "text", &[1.0], tag).await.unwrap();
        }
        assert_eq!(
            store.count_by_source_type().await.unwrap(),
            vec![
                (SourceType::RawIncident, 2),
                (SourceType::VerifiedDiagnosis, 1)
            ]
        );
        assert_eq!(store.clear().await.unwrap(), 3);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
