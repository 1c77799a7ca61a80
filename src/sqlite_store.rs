//! SQLite-backed [`EmbeddingStore`] implementation.
//!
//! One [`SqliteEmbeddingStore`] per owner family, each over its own table
//! (`incident_embeddings` or `fragment_embeddings`). Writes go straight
//! to SQL; `find_similar` is delegated to the configured
//! [`SimilaritySearcher`].
//!
//! # Error mapping
//!
//! | SQLite condition | [`StoreError`] |
//! |------------------|----------------|
//! | foreign-key violation on insert | `OwnerNotFound` |
//! | unique violation on insert | `DuplicateKey` |
//! | any other write failure | `Persistence` |
//! | any read failure | `Search` |
//! | stored payload not a multiple of 4 bytes | `MalformedVector` |
//!
//! Vectors with a NaN or infinite component are rejected before any SQL
//! runs, on insert and on search, with `NonFiniteVector`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use incident_recall_core::codec::{decode, encode};
use incident_recall_core::store::{check_dimensions, check_finite};
use incident_recall_core::{
    EmbeddingRecord, EmbeddingStore, OwnerFamily, ScoredRecord, SourceType, StoreError,
};

use crate::searcher::SimilaritySearcher;

/// Table holding the embeddings of one owner family.
pub fn embedding_table(family: OwnerFamily) -> &'static str {
    match family {
        OwnerFamily::Incident => "incident_embeddings",
        OwnerFamily::Fragment => "fragment_embeddings",
    }
}

/// SQLite implementation of [`EmbeddingStore`] for one owner family.
pub struct SqliteEmbeddingStore {
    pool: SqlitePool,
    family: OwnerFamily,
    searcher: Arc<dyn SimilaritySearcher>,
}

impl SqliteEmbeddingStore {
    pub fn new(pool: SqlitePool, family: OwnerFamily, searcher: Arc<dyn SimilaritySearcher>) -> Self {
        Self {
            pool,
            family,
            searcher,
        }
    }

    pub fn searcher_name(&self) -> &'static str {
        self.searcher.name()
    }

    /// Component count of the vectors already stored, if any.
    async fn stored_dims(&self) -> Result<Option<usize>, StoreError> {
        let sql = format!(
            "SELECT length(embedding) FROM {} ORDER BY id LIMIT 1",
            embedding_table(self.family)
        );
        let len: Option<i64> = sqlx::query_scalar(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error)?;
        Ok(len.map(|bytes| bytes as usize / 4))
    }
}

#[async_trait]
impl EmbeddingStore for SqliteEmbeddingStore {
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
        let expected = match self.stored_dims().await {
            Ok(dims) => dims.unwrap_or(vector.len()),
            Err(e) => return Err(StoreError::Persistence(e.to_string())),
        };
        check_dimensions(expected, vector.len())?;
        check_finite(vector)?;

        let created_at = Utc::now().timestamp();
        let sql = format!(
            "INSERT INTO {} (owner_id, source_text, embedding, created_at, source_type) \
             VALUES (?, ?, ?, ?, ?)",
            embedding_table(self.family)
        );
        let result = sqlx::query(&sql)
            .bind(owner_id)
            .bind(source_text)
            .bind(encode(vector))
            .bind(created_at)
            .bind(source_type.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, self.family, owner_id))?;

        let id = result.last_insert_rowid();
        debug!(family = %self.family, id, owner_id, "inserted embedding row");

        Ok(EmbeddingRecord {
            id,
            owner_id,
            source_text: source_text.to_string(),
            vector: vector.to_vec(),
            created_at: timestamp(created_at)?,
            source_type,
        })
    }

    async fn find_similar(
        &self,
        query: &[f32],
        min_score: f64,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let stored = self.stored_dims().await?;
        check_dimensions(stored.unwrap_or(query.len()), query.len())?;
        check_finite(query)?;
        if limit == 0 || stored.is_none() {
            return Ok(Vec::new());
        }
        self.searcher
            .search(&self.pool, self.family, query, min_score, limit)
            .await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", embedding_table(self.family));
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(read_error)?;
        Ok(count as u64)
    }

    async fn count_by_source_type(&self) -> Result<Vec<(SourceType, u64)>, StoreError> {
        let sql = format!(
            "SELECT source_type, COUNT(*) AS n FROM {} GROUP BY source_type",
            embedding_table(self.family)
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(read_error)?;

        // Unrecognized tags fold into the family default.
        let mut counts = std::collections::BTreeMap::new();
        for row in &rows {
            let tag: Option<String> = row.try_get("source_type").map_err(read_error)?;
            let n: i64 = row.try_get("n").map_err(read_error)?;
            let source_type = SourceType::parse_or_default(tag.as_deref(), self.family);
            *counts.entry(source_type).or_insert(0u64) += n as u64;
        }
        Ok(counts.into_iter().collect())
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {}", embedding_table(self.family));
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

/// Decode one embedding row (`id, owner_id, source_text, embedding,
/// created_at, source_type`).
pub(crate) fn record_from_row(
    row: &SqliteRow,
    family: OwnerFamily,
) -> Result<EmbeddingRecord, StoreError> {
    let blob: Vec<u8> = row.try_get("embedding").map_err(read_error)?;
    let tag: Option<String> = row.try_get("source_type").map_err(read_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(read_error)?;

    Ok(EmbeddingRecord {
        id: row.try_get("id").map_err(read_error)?,
        owner_id: row.try_get("owner_id").map_err(read_error)?,
        source_text: row.try_get("source_text").map_err(read_error)?,
        vector: decode(&blob)?,
        created_at: timestamp(created_at)?,
        source_type: SourceType::parse_or_default(tag.as_deref(), family),
    })
}

pub(crate) fn read_error(err: sqlx::Error) -> StoreError {
    StoreError::Search(err.to_string())
}

fn write_error(err: sqlx::Error, family: OwnerFamily, owner_id: i64) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.kind() {
            ErrorKind::ForeignKeyViolation => {
                return StoreError::OwnerNotFound { family, owner_id }
            }
            ErrorKind::UniqueViolation => return StoreError::DuplicateKey(db_err.to_string()),
            _ => {}
        }
    }
    StoreError::Persistence(err.to_string())
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::Search(format!("created_at out of range: {}", secs)))
}
