//! Error types for the retrieval engine.
//!
//! Three layers, each a `thiserror` enum:
//!
//! - [`CodecError`]: a stored vector payload could not be decoded.
//! - [`StoreError`]: an [`EmbeddingStore`](crate::store::EmbeddingStore)
//!   read or write failed.
//! - [`RecallError`]: what the generation and retrieval services return
//!   to callers. The only variant a caller is expected to branch on is
//!   [`RecallError::Unexpected`] inside batch contexts (owner not found).

use thiserror::Error;

use crate::models::OwnerFamily;

/// Vector payload decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed vector payload: {len} bytes is not a multiple of 4")]
    MalformedVector { len: usize },
}

/// Errors surfaced by an embedding store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The owning incident or fragment does not exist (foreign-key violation).
    #[error("{family} {owner_id} does not exist")]
    OwnerNotFound { family: OwnerFamily, owner_id: i64 },

    /// The backend rejected the row on a key collision.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Any other write failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Any read failure during a similarity search.
    #[error("search failed: {0}")]
    Search(String),

    /// A stored vector could not be decoded.
    #[error(transparent)]
    MalformedVector(#[from] CodecError),

    /// A vector component is NaN or infinite.
    #[error("vector component {index} is not finite")]
    NonFiniteVector { index: usize },

    /// The query vector has a different dimension than the stored vectors.
    #[error("dimension mismatch: stored vectors have {expected} components, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl StoreError {
    /// True for failures caused by a storage constraint (key or foreign key).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::OwnerNotFound { .. } | StoreError::DuplicateKey(_)
        )
    }
}

/// Errors returned by the generation and retrieval services.
#[derive(Error, Debug)]
pub enum RecallError {
    /// Canonical text for an owner record was blank after trimming.
    #[error("invalid text: {0}")]
    InvalidText(String),

    /// Query text for a candidate record was blank after trimming.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The embedding provider failed while embedding a retrieval query.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// The embedding provider (or an unclassified write) failed during generation.
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    /// A store read failed during retrieval.
    #[error("similarity search failed: {0}")]
    SearchFailed(String),

    /// A store write was rejected by a constraint.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// The referenced owner record does not exist.
    #[error("unexpected: {0}")]
    Unexpected(String),

    /// A stored vector could not be decoded.
    #[error(transparent)]
    MalformedVector(#[from] CodecError),
}

impl RecallError {
    /// True when the failure means the owner id was stale. Batch embedding
    /// skips these and keeps going.
    pub fn is_owner_missing(&self) -> bool {
        matches!(self, RecallError::Unexpected(_))
    }
}
