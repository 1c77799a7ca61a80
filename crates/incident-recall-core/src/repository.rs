//! Read-only lookups of owner records.
//!
//! Incidents and runbook fragments are persisted by the surrounding
//! application. The engine only needs to fetch one by id.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Incident, RunbookFragment};

#[async_trait]
pub trait IncidentRepository: Send + Sync {
    /// `Ok(None)` when no incident has this id.
    async fn find_by_id(&self, id: i64) -> Result<Option<Incident>>;
}

#[async_trait]
pub trait FragmentRepository: Send + Sync {
    /// `Ok(None)` when no fragment has this id.
    async fn find_by_id(&self, id: i64) -> Result<Option<RunbookFragment>>;
}

/// In-memory incident lookups, keyed by id.
#[derive(Default)]
pub struct InMemoryIncidents {
    rows: HashMap<i64, Incident>,
}

impl InMemoryIncidents {
    pub fn new(incidents: impl IntoIterator<Item = Incident>) -> Self {
        Self {
            rows: incidents.into_iter().map(|i| (i.id, i)).collect(),
        }
    }
}

#[async_trait]
impl IncidentRepository for InMemoryIncidents {
    async fn find_by_id(&self, id: i64) -> Result<Option<Incident>> {
        Ok(self.rows.get(&id).cloned())
    }
}

/// In-memory fragment lookups, keyed by id.
#[derive(Default)]
pub struct InMemoryFragments {
    rows: HashMap<i64, RunbookFragment>,
}

impl InMemoryFragments {
    pub fn new(fragments: impl IntoIterator<Item = RunbookFragment>) -> Self {
        Self {
            rows: fragments.into_iter().map(|f| (f.id, f)).collect(),
        }
    }
}

#[async_trait]
impl FragmentRepository for InMemoryFragments {
    async fn find_by_id(&self, id: i64) -> Result<Option<RunbookFragment>> {
        Ok(self.rows.get(&id).cloned())
    }
}
