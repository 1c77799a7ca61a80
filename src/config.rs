//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/recall.sqlite"
//!
//! [search]
//! strategy = "native"          # or "fallback"
//!
//! [embedding]
//! provider = "ollama"          # disabled | openai | ollama | local
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [retrieval]
//! incident_min_score = 0.7
//! incident_limit = 5
//! fragment_min_score = 0.6
//! fragment_limit = 15
//! snippet_chars = 300
//!
//! [retrieval.boost]
//! VERIFIED_DIAGNOSIS = 1.1
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use incident_recall_core::retrieval::{
    CallSiteLimits, ProvenanceBoost, RetrievalParams, SearchLimits,
};
use incident_recall_core::SourceType;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Which [`SimilaritySearcher`](crate::searcher::SimilaritySearcher) the
/// SQLite stores are built with.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// sqlite-vec computes and ranks similarity inside SQLite.
    #[default]
    Native,
    /// Rows are loaded and ranked in process.
    Fallback,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SearchConfig {
    #[serde(default)]
    pub strategy: SearchStrategy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// `(min_score, limit)` pairs per call site and family, plus snippet
/// length and provenance boost.
///
/// `incident_*` / `fragment_*` apply to both call sites. The optional
/// `[retrieval.for_fragment]` table overrides them for fragment retrieval.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_incident_min_score")]
    pub incident_min_score: f64,
    #[serde(default = "default_incident_limit")]
    pub incident_limit: usize,
    #[serde(default = "default_fragment_min_score")]
    pub fragment_min_score: f64,
    #[serde(default = "default_fragment_limit")]
    pub fragment_limit: usize,
    #[serde(default)]
    pub for_fragment: Option<CallSiteOverride>,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    /// Source-type tag → score multiplier.
    #[serde(default)]
    pub boost: HashMap<String, f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CallSiteOverride {
    pub incident_min_score: Option<f64>,
    pub incident_limit: Option<usize>,
    pub fragment_min_score: Option<f64>,
    pub fragment_limit: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            incident_min_score: default_incident_min_score(),
            incident_limit: default_incident_limit(),
            fragment_min_score: default_fragment_min_score(),
            fragment_limit: default_fragment_limit(),
            for_fragment: None,
            snippet_chars: default_snippet_chars(),
            boost: HashMap::new(),
        }
    }
}

fn default_incident_min_score() -> f64 {
    0.7
}
fn default_incident_limit() -> usize {
    5
}
fn default_fragment_min_score() -> f64 {
    0.6
}
fn default_fragment_limit() -> usize {
    15
}
fn default_snippet_chars() -> usize {
    300
}

impl RetrievalConfig {
    /// Resolve into the core crate's [`RetrievalParams`].
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown boost tag.
    pub fn to_params(&self) -> Result<RetrievalParams> {
        let base = CallSiteLimits {
            incidents: SearchLimits::new(self.incident_min_score, self.incident_limit),
            fragments: SearchLimits::new(self.fragment_min_score, self.fragment_limit),
        };
        let for_fragment = match &self.for_fragment {
            None => base,
            Some(o) => CallSiteLimits {
                incidents: SearchLimits::new(
                    o.incident_min_score.unwrap_or(base.incidents.min_score),
                    o.incident_limit.unwrap_or(base.incidents.limit),
                ),
                fragments: SearchLimits::new(
                    o.fragment_min_score.unwrap_or(base.fragments.min_score),
                    o.fragment_limit.unwrap_or(base.fragments.limit),
                ),
            },
        };

        let mut factors = Vec::with_capacity(self.boost.len());
        for (tag, factor) in &self.boost {
            let source_type = SourceType::parse(tag)
                .with_context(|| format!("retrieval.boost: unknown source type '{}'", tag))?;
            factors.push((source_type, *factor));
        }

        Ok(RetrievalParams {
            for_incident: base,
            for_fragment,
            snippet_chars: self.snippet_chars,
            boost: ProvenanceBoost::new(factors),
        })
    }
}

impl Config {
    /// A config pointing at `db_path` with every other section defaulted.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            search: SearchConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let r = &config.retrieval;
    let params = r.to_params()?;
    for (site, limits) in [
        ("incident", params.for_incident),
        ("fragment", params.for_fragment),
    ] {
        for (family, l) in [("incident", limits.incidents), ("fragment", limits.fragments)] {
            if !(-1.0..=1.0).contains(&l.min_score) {
                bail!(
                    "retrieval: {} min_score for {} retrieval must be in [-1.0, 1.0]",
                    family,
                    site
                );
            }
            if l.limit < 1 {
                bail!(
                    "retrieval: {} limit for {} retrieval must be >= 1",
                    family,
                    site
                );
            }
        }
    }
    if r.snippet_chars == 0 {
        bail!("retrieval.snippet_chars must be > 0");
    }
    for (tag, factor) in &r.boost {
        if !factor.is_finite() || *factor <= 0.0 {
            bail!("retrieval.boost.{} must be a positive number", tag);
        }
    }

    if config.embedding.is_enabled() && config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.provider == "openai" || config.embedding.provider == "ollama" {
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() {
            bail!(
                "embedding.dims must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    Ok(())
}
