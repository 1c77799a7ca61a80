//! Storage abstraction for embedding records.
//!
//! The [`EmbeddingStore`] trait defines the write and search operations
//! the generation and retrieval services need. There is one store per
//! [`OwnerFamily`]; both families share the same contract.
//!
//! [`rank_by_similarity`] is the brute-force search routine. It is the
//! correctness reference: the in-memory store uses it directly and the
//! SQLite fallback strategy runs it over rows loaded from disk.

pub mod memory;

use async_trait::async_trait;

use crate::codec::similarity_score;
use crate::error::StoreError;
use crate::models::{EmbeddingRecord, OwnerFamily, ScoredRecord, SourceType};

/// Abstract embedding store for one owner family.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](EmbeddingStore::insert) | Persist a new embedding record |
/// | [`find_similar`](EmbeddingStore::find_similar) | Top-K cosine search above a threshold |
/// | [`count`](EmbeddingStore::count) | Number of stored records |
/// | [`count_by_source_type`](EmbeddingStore::count_by_source_type) | Record counts per provenance tag |
/// | [`clear`](EmbeddingStore::clear) | Delete every record (bulk reset) |
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// The owner family this store holds embeddings for.
    fn family(&self) -> OwnerFamily;

    /// Persist a new embedding record.
    ///
    /// No uniqueness is enforced on `owner_id`; embedding the same owner
    /// twice produces two records.
    ///
    /// # Errors
    ///
    /// - [`StoreError::OwnerNotFound`] if the owner no longer exists.
    /// - [`StoreError::DuplicateKey`] on a backend key collision.
    /// - [`StoreError::DimensionMismatch`] if `vector` has a different length
    ///   than the vectors already stored.
    /// - [`StoreError::NonFiniteVector`] if any component is NaN or infinite.
    /// - [`StoreError::Persistence`] for any other write failure.
    async fn insert(
        &self,
        owner_id: i64,
        source_text: &str,
        vector: &[f32],
        source_type: SourceType,
    ) -> Result<EmbeddingRecord, StoreError>;

    /// Return at most `limit` records whose similarity to `query` is
    /// `>= min_score`, strictly descending by score. Ties keep insertion
    /// order. A query with a NaN or infinite component is rejected with
    /// [`StoreError::NonFiniteVector`].
    async fn find_similar(
        &self,
        query: &[f32],
        min_score: f64,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Record counts per provenance tag, in tag order. Tags with no
    /// records are omitted.
    async fn count_by_source_type(&self) -> Result<Vec<(SourceType, u64)>, StoreError>;

    /// Delete every record. Returns the number of records removed.
    async fn clear(&self) -> Result<u64, StoreError>;
}

/// Rank `records` against `query` by brute force.
///
/// `records` must be in insertion order: the sort is stable, so equal
/// scores keep that order. Records scoring below `min_score` are
/// discarded before truncating to `limit`.
///
/// # Errors
///
/// [`StoreError::DimensionMismatch`] if the query is empty or any record's
/// vector length differs from the query's, [`StoreError::NonFiniteVector`]
/// if the query has a NaN or infinite component.
pub fn rank_by_similarity<I>(
    records: I,
    query: &[f32],
    min_score: f64,
    limit: usize,
) -> Result<Vec<ScoredRecord>, StoreError>
where
    I: IntoIterator<Item = EmbeddingRecord>,
{
    if query.is_empty() {
        return Err(StoreError::DimensionMismatch {
            expected: 0,
            actual: 0,
        });
    }
    check_finite(query)?;
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut scored = Vec::new();
    for record in records {
        check_dimensions(record.vector.len(), query.len())?;
        let score = similarity_score(query, &record.vector);
        if score >= min_score {
            scored.push(ScoredRecord { record, score });
        }
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    Ok(scored)
}

/// Reject a query (or a new vector) whose length differs from the stored
/// dimension. An empty vector never matches.
pub fn check_dimensions(expected: usize, actual: usize) -> Result<(), StoreError> {
    if actual == 0 || expected != actual {
        return Err(StoreError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Reject a vector with a NaN or infinite component.
pub fn check_finite(vector: &[f32]) -> Result<(), StoreError> {
    match vector.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(StoreError::NonFiniteVector { index }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: i64, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id,
            owner_id: id * 10,
            source_text: format!("record {}", id),
            vector,
            created_at: Utc::now(),
            source_type: SourceType::RawIncident,
        }
    }

    fn ids(results: &[ScoredRecord]) -> Vec<i64> {
        results.iter().map(|r| r.record.id).collect()
    }

    #[test]
    fn ranks_descending_and_filters_threshold() {
        let records = vec![
            record(1, vec![0.0, 1.0]),
            record(2, vec![1.0, 0.0]),
            record(3, vec![1.0, 1.0]),
        ];
        let results = rank_by_similarity(records, &[1.0, 0.1], 0.5, 10).unwrap();
        assert_eq!(ids(&results), vec![2, 3]);
        assert!(results.iter().all(|r| r.score >= 0.5));
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn truncates_to_highest_scoring() {
        let records = vec![
            record(1, vec![0.2, 1.0]),
            record(2, vec![1.0, 0.0]),
            record(3, vec![1.0, 0.5]),
            record(4, vec![1.0, 0.1]),
        ];
        let results = rank_by_similarity(records, &[1.0, 0.0], -1.0, 2).unwrap();
        assert_eq!(ids(&results), vec![2, 4]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let records = vec![
            record(5, vec![2.0, 0.0]),
            record(6, vec![1.0, 0.0]),
            record(7, vec![3.0, 0.0]),
        ];
        let results = rank_by_similarity(records, &[1.0, 0.0], 0.0, 10).unwrap();
        assert_eq!(ids(&results), vec![5, 6, 7]);
    }

    #[test]
    fn zero_limit_returns_nothing() {
        let records = vec![record(1, vec![1.0, 0.0])];
        assert!(rank_by_similarity(records, &[1.0, 0.0], 0.0, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let records = vec![record(1, vec![1.0, 0.0, 0.0])];
        let err = rank_by_similarity(records, &[1.0, 0.0], 0.0, 5).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn empty_query_is_rejected_even_without_records() {
        let err = rank_by_similarity(Vec::new(), &[], 0.0, 5).unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { actual: 0, .. }));
    }

    #[test]
    fn zero_norm_record_scores_zero() {
        let records = vec![record(1, vec![0.0, 0.0]), record(2, vec![1.0, 0.0])];
        let results = rank_by_similarity(records, &[1.0, 0.0], 0.0, 5).unwrap();
        assert_eq!(ids(&results), vec![2, 1]);
        assert_eq!(results[1].score, 0.0);
    }

    #[test]
    fn non_finite_query_is_rejected() {
        let records = vec![record(1, vec![1.0, 0.0])];
        let err = rank_by_similarity(records, &[f32::NAN, 0.0], 0.0, 5).unwrap_err();
        assert!(matches!(err, StoreError::NonFiniteVector { index: 0 }));
        assert!(matches!(
            check_finite(&[1.0, f32::NEG_INFINITY]),
            Err(StoreError::NonFiniteVector { index: 1 })
        ));
        assert!(check_finite(&[1.0, -2.0]).is_ok());
    }

    #[test]
    fn self_match_scores_at_most_one() {
        let v = vec![0.137, -0.482, 0.911, 0.003, -0.274, 0.659, 0.388, -0.705];
        let records = vec![record(1, v.clone())];
        let results = rank_by_similarity(records, &v, 0.7, 5).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score <= 1.0 && results[0].score >= 0.7);
    }
}
