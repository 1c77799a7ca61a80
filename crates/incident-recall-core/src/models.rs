//! Data models for the retrieval engine.
//!
//! Embedding records are written once and never mutated. Retrieval
//! matches and contexts are read-only projections built per request.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The record family an embedding belongs to. Each family has its own store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerFamily {
    Incident,
    Fragment,
}

impl OwnerFamily {
    /// Provenance tag used when none (or an unknown one) is recorded.
    pub fn default_source_type(self) -> SourceType {
        match self {
            OwnerFamily::Incident => SourceType::RawIncident,
            OwnerFamily::Fragment => SourceType::OfficialRunbook,
        }
    }
}

impl fmt::Display for OwnerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerFamily::Incident => f.write_str("incident"),
            OwnerFamily::Fragment => f.write_str("runbook fragment"),
        }
    }
}

/// Provenance of an embedding's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    RawIncident,
    VerifiedDiagnosis,
    OfficialRunbook,
    CommunityNote,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::RawIncident,
        SourceType::VerifiedDiagnosis,
        SourceType::OfficialRunbook,
        SourceType::CommunityNote,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::RawIncident => "RAW_INCIDENT",
            SourceType::VerifiedDiagnosis => "VERIFIED_DIAGNOSIS",
            SourceType::OfficialRunbook => "OFFICIAL_RUNBOOK",
            SourceType::CommunityNote => "COMMUNITY_NOTE",
        }
    }

    /// Parse a stored tag, case-insensitively. `None` if unrecognized.
    pub fn parse(tag: &str) -> Option<SourceType> {
        let tag = tag.trim();
        SourceType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(tag))
    }

    /// Parse a stored tag, falling back to the family default when the tag
    /// is absent or unrecognized.
    pub fn parse_or_default(tag: Option<&str>, family: OwnerFamily) -> SourceType {
        tag.and_then(SourceType::parse)
            .unwrap_or_else(|| family.default_source_type())
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted embedding of one owner record's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingRecord {
    /// Store-assigned identifier.
    pub id: i64,
    /// Incident or fragment this embedding represents.
    pub owner_id: i64,
    /// The exact text that was embedded.
    pub source_text: String,
    /// Embedding vector (decoded from the stored payload).
    #[serde(skip)]
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub source_type: SourceType,
}

/// A store search hit: the record plus its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: EmbeddingRecord,
    pub score: f64,
}

/// Read-only projection of a search hit handed to the diagnosis step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalMatch {
    pub owner_id: i64,
    pub score: f64,
    /// Source text, truncated to the configured snippet length.
    pub snippet: String,
    pub source_type: SourceType,
}

/// Ranked matches from both stores for one retrieval request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalContext {
    pub similar_incident_matches: Vec<RetrievalMatch>,
    pub similar_fragment_matches: Vec<RetrievalMatch>,
    pub query_text: String,
}

impl RetrievalContext {
    /// True when neither store produced a match.
    pub fn is_empty(&self) -> bool {
        self.similar_incident_matches.is_empty() && self.similar_fragment_matches.is_empty()
    }
}

/// An incident as the owning application stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub severity: Option<String>,
    pub status: Option<String>,
}

/// A knowledge-base (runbook) fragment as the owning application stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunbookFragment {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// An incident-shaped retrieval query. Need not be persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentCandidate {
    pub title: String,
    pub description: String,
    pub severity: Option<String>,
    pub status: Option<String>,
}

/// A fragment-shaped retrieval query. Need not be persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentCandidate {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_parse_is_case_insensitive() {
        assert_eq!(
            SourceType::parse("verified_diagnosis"),
            Some(SourceType::VerifiedDiagnosis)
        );
        assert_eq!(SourceType::parse(" OFFICIAL_RUNBOOK "), Some(SourceType::OfficialRunbook));
        assert_eq!(SourceType::parse("wiki"), None);
    }

    #[test]
    fn source_type_defaults_per_family() {
        assert_eq!(
            SourceType::parse_or_default(None, OwnerFamily::Incident),
            SourceType::RawIncident
        );
        assert_eq!(
            SourceType::parse_or_default(Some("bogus"), OwnerFamily::Fragment),
            SourceType::OfficialRunbook
        );
        assert_eq!(
            SourceType::parse_or_default(Some("community_note"), OwnerFamily::Fragment),
            SourceType::CommunityNote
        );
    }

    #[test]
    fn source_type_serializes_as_tag() {
        let json = serde_json::to_string(&SourceType::VerifiedDiagnosis).unwrap();
        assert_eq!(json, "\"VERIFIED_DIAGNOSIS\"");
    }
}
