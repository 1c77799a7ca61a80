//! # Incident Recall Core
//!
//! Storage-agnostic logic for Incident Recall: embedding records, the
//! vector codec, the store and provider seams, the brute-force ranking
//! routine, and the generation and retrieval services built on top of
//! them.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! runtime-specific dependencies. Concrete backends (SQLite stores,
//! HTTP embedding providers) live in the `incident-recall` app crate.

pub mod codec;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod repository;
pub mod retrieval;
pub mod store;
pub mod text;

pub use error::{CodecError, RecallError, StoreError};
pub use generation::EmbeddingGenerator;
pub use models::{
    EmbeddingRecord, OwnerFamily, RetrievalContext, RetrievalMatch, ScoredRecord, SourceType,
};
pub use retrieval::{RetrievalParams, RetrievalService, SearchLimits};
pub use store::EmbeddingStore;
