//! `recall embed ...` commands.

use anyhow::{bail, Result};

use incident_recall_core::{EmbeddingStore, SourceType};

use crate::config::Config;
use crate::engine::Engine;

fn require_provider(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    Ok(())
}

/// Embed one incident. `verified` tags it `VERIFIED_DIAGNOSIS`.
pub async fn run_embed_incident(config: &Config, id: i64, verified: bool) -> Result<()> {
    require_provider(config)?;
    let engine = Engine::open(config).await?;

    let source_type = if verified {
        SourceType::VerifiedDiagnosis
    } else {
        SourceType::RawIncident
    };
    let count = engine.generator.embed_incident_as(id, source_type).await?;

    println!("embed incident {}", id);
    println!("  source type: {}", source_type);
    println!("  embedded: {}", count);

    engine.close().await;
    Ok(())
}

pub async fn run_embed_fragment(config: &Config, id: i64) -> Result<()> {
    require_provider(config)?;
    let engine = Engine::open(config).await?;

    let count = engine.generator.embed_runbook_fragment(id).await?;

    println!("embed fragment {}", id);
    println!("  embedded: {}", count);

    engine.close().await;
    Ok(())
}

/// Embed the listed ids. Stale ids are skipped; any other failure aborts.
pub async fn run_embed_batch(
    config: &Config,
    incident_ids: &[i64],
    fragment_ids: &[i64],
) -> Result<()> {
    require_provider(config)?;
    let engine = Engine::open(config).await?;

    let count = engine
        .generator
        .embed_batch(incident_ids, fragment_ids)
        .await?;

    println!("embed batch");
    println!(
        "  requested: {} incidents, {} fragments",
        incident_ids.len(),
        fragment_ids.len()
    );
    println!("  embedded: {}", count);

    engine.close().await;
    Ok(())
}

/// Embed every incident and fragment currently in the database.
pub async fn run_embed_all(config: &Config) -> Result<()> {
    require_provider(config)?;
    let engine = Engine::open(config).await?;

    let incident_ids = engine.incidents.all_ids().await?;
    let fragment_ids = engine.fragments.all_ids().await?;
    let count = engine
        .generator
        .embed_batch(&incident_ids, &fragment_ids)
        .await?;

    println!("embed all");
    println!(
        "  found: {} incidents, {} fragments",
        incident_ids.len(),
        fragment_ids.len()
    );
    println!("  embedded: {}", count);

    engine.close().await;
    Ok(())
}

/// Delete every embedding in both stores.
pub async fn run_embed_clear(config: &Config) -> Result<()> {
    let engine = Engine::open(config).await?;

    let incidents = engine.incident_store.clear().await?;
    let fragments = engine.fragment_store.clear().await?;

    println!("embed clear");
    println!("  incident embeddings removed: {}", incidents);
    println!("  fragment embeddings removed: {}", fragments);

    engine.close().await;
    Ok(())
}
