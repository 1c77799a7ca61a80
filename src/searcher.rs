//! Similarity search strategies for the SQLite embedding stores.
//!
//! Both strategies answer the same question over the same table: the
//! `limit` rows most similar to a query vector with a score of at least
//! `min_score`, best first, ties broken by ascending row id.
//!
//! | Strategy | Where similarity is computed |
//! |----------|------------------------------|
//! | [`NativeSearcher`] | In SQL via sqlite-vec's `vec_distance_cosine` |
//! | [`FallbackSearcher`] | In process via [`rank_by_similarity`] |
//!
//! Scores agree exactly: sqlite-vec returns the cosine distance as an
//! `f32` and the score is `1.0 - distance` in double precision, which is
//! what [`incident_recall_core::codec::similarity_score`] computes. Rows
//! sqlite-vec cannot score (zero norm) come back as `NULL` and are
//! coalesced to `0.0`, the in-process value for the same input. Both
//! sides clamp the result to `[-1.0, 1.0]`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use incident_recall_core::codec::encode;
use incident_recall_core::store::rank_by_similarity;
use incident_recall_core::{OwnerFamily, ScoredRecord, StoreError};

use crate::config::SearchStrategy;
use crate::sqlite_store::{embedding_table, read_error, record_from_row};

/// One way of running `find_similar` against an embedding table.
#[async_trait]
pub trait SimilaritySearcher: Send + Sync {
    /// Strategy name for logs and stats.
    fn name(&self) -> &'static str;

    /// Top-`limit` rows of `family`'s embedding table scoring
    /// `>= min_score` against `query`.
    ///
    /// Callers have already validated the query dimension and a non-zero
    /// `limit`.
    async fn search(
        &self,
        pool: &SqlitePool,
        family: OwnerFamily,
        query: &[f32],
        min_score: f64,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError>;
}

/// Build the searcher for a configured strategy.
pub fn searcher_for(strategy: SearchStrategy) -> Arc<dyn SimilaritySearcher> {
    match strategy {
        SearchStrategy::Native => Arc::new(NativeSearcher),
        SearchStrategy::Fallback => Arc::new(FallbackSearcher),
    }
}

/// Ranks inside SQLite with sqlite-vec. Only the returned rows leave the
/// database.
///
/// The pool must have been opened after
/// [`register_sqlite_vec`](crate::db::register_sqlite_vec).
pub struct NativeSearcher;

impl NativeSearcher {
    /// Confirm sqlite-vec is loaded on `pool`. Returns its version string.
    pub async fn probe(pool: &SqlitePool) -> Result<String, StoreError> {
        sqlx::query_scalar("SELECT vec_version()")
            .fetch_one(pool)
            .await
            .map_err(|e| StoreError::Search(format!("sqlite-vec is not available: {}", e)))
    }
}

#[async_trait]
impl SimilaritySearcher for NativeSearcher {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn search(
        &self,
        pool: &SqlitePool,
        family: OwnerFamily,
        query: &[f32],
        min_score: f64,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let table = embedding_table(family);
        let sql = format!(
            r#"
            SELECT id, owner_id, source_text, embedding, created_at, source_type, score
            FROM (
                SELECT id, owner_id, source_text, embedding, created_at, source_type,
                       MIN(1.0, MAX(-1.0, COALESCE(1.0 - vec_distance_cosine(embedding, ?), 0.0))) AS score
                FROM {table}
            )
            WHERE score >= ?
            ORDER BY score DESC, id ASC
            LIMIT ?
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(encode(query))
            .bind(min_score)
            .bind(limit as i64)
            .fetch_all(pool)
            .await
            .map_err(read_error)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let score: f64 = row.try_get("score").map_err(read_error)?;
            results.push(ScoredRecord {
                record: record_from_row(row, family)?,
                score,
            });
        }

        debug!(table, hits = results.len(), "native similarity search");
        Ok(results)
    }
}

/// Loads every row and ranks in process. Works on any SQLite build.
pub struct FallbackSearcher;

#[async_trait]
impl SimilaritySearcher for FallbackSearcher {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn search(
        &self,
        pool: &SqlitePool,
        family: OwnerFamily,
        query: &[f32],
        min_score: f64,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let table = embedding_table(family);
        // Ascending id is insertion order, which the stable sort preserves for ties.
        let sql = format!(
            "SELECT id, owner_id, source_text, embedding, created_at, source_type \
             FROM {table} ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(pool)
            .await
            .map_err(read_error)?;

        let scanned = rows.len();
        let records = rows
            .iter()
            .map(|row| record_from_row(row, family))
            .collect::<Result<Vec<_>, _>>()?;
        let results = rank_by_similarity(records, query, min_score, limit)?;

        debug!(table, scanned, hits = results.len(), "fallback similarity search");
        Ok(results)
    }
}
