//! SQLite lookups of incidents and runbook fragments.
//!
//! These tables belong to the surrounding application. The engine reads
//! them by id and never writes to them.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use incident_recall_core::models::{Incident, RunbookFragment};
use incident_recall_core::repository::{FragmentRepository, IncidentRepository};

pub struct SqliteIncidents {
    pool: SqlitePool,
}

impl SqliteIncidents {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every incident id, ascending.
    pub async fn all_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT id FROM incidents ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl IncidentRepository for SqliteIncidents {
    async fn find_by_id(&self, id: i64) -> Result<Option<Incident>> {
        let row = sqlx::query(
            "SELECT id, title, description, severity, status FROM incidents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Incident {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            severity: row.get("severity"),
            status: row.get("status"),
        }))
    }
}

pub struct SqliteFragments {
    pool: SqlitePool,
}

impl SqliteFragments {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every fragment id, ascending.
    pub async fn all_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT id FROM runbook_fragments ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl FragmentRepository for SqliteFragments {
    async fn find_by_id(&self, id: i64) -> Result<Option<RunbookFragment>> {
        let row = sqlx::query("SELECT id, title, content, tags FROM runbook_fragments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let tags: String = row.get("tags");
            RunbookFragment {
                id: row.get("id"),
                title: row.get("title"),
                content: row.get("content"),
                tags: split_tags(&tags),
            }
        }))
    }
}

/// Tags are stored comma-separated.
fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
