//! # Incident Recall
//!
//! Embedding-backed similarity retrieval for an incident-management
//! application. Incidents and runbook fragments are embedded into two
//! SQLite stores; a new incident (or fragment) is answered with the most
//! similar prior records to ground a diagnosis step.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌─────────────────────┐
//! │ incidents  │──▶│ generation │──▶│ incident_embeddings │
//! │ fragments  │   │  (embed)   │   │ fragment_embeddings │
//! └────────────┘   └────────────┘   └──────────┬──────────┘
//!                                              │ native | fallback
//!                  ┌────────────┐              ▼
//!  candidate ────▶ │ retrieval  │◀──── SimilaritySearcher
//!                  └─────┬──────┘
//!                        ▼
//!                 RetrievalContext
//! ```
//!
//! The storage-agnostic services live in `incident-recall-core`. This
//! crate supplies the SQLite stores, the two search strategies, the HTTP
//! and local embedding providers, configuration and the `recall` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection and sqlite-vec registration |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `EmbeddingStore` |
//! | [`searcher`] | Native and fallback similarity search |
//! | [`repository`] | Incident and fragment lookups |
//! | [`embedding`] | Embedding providers |
//! | [`engine`] | Wiring of stores, provider and services |

pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod engine;
pub mod migrate;
pub mod repository;
pub mod retrieve_cmd;
pub mod searcher;
pub mod sqlite_store;
pub mod stats;
