//! `recall retrieve ...` commands: print the retrieval context for an
//! ad-hoc incident or fragment candidate.

use anyhow::{bail, Result};

use incident_recall_core::models::{FragmentCandidate, IncidentCandidate};
use incident_recall_core::{RetrievalContext, RetrievalMatch};

use crate::config::Config;
use crate::engine::Engine;

pub async fn run_retrieve_incident(
    config: &Config,
    candidate: &IncidentCandidate,
    json: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Retrieval requires an embedding provider. Set [embedding] provider in config.");
    }
    let engine = Engine::open(config).await?;
    let context = engine.retrieval.retrieve_for_incident(candidate).await?;
    print_context(&context, json)?;
    engine.close().await;
    Ok(())
}

pub async fn run_retrieve_fragment(
    config: &Config,
    candidate: &FragmentCandidate,
    json: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Retrieval requires an embedding provider. Set [embedding] provider in config.");
    }
    let engine = Engine::open(config).await?;
    let context = engine.retrieval.retrieve_for_fragment(candidate).await?;
    print_context(&context, json)?;
    engine.close().await;
    Ok(())
}

fn print_context(context: &RetrievalContext, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(context)?);
        return Ok(());
    }

    if context.is_empty() {
        println!("No results.");
        return Ok(());
    }

    print_matches("Similar incidents", &context.similar_incident_matches);
    print_matches("Runbook fragments", &context.similar_fragment_matches);
    Ok(())
}

fn print_matches(heading: &str, matches: &[RetrievalMatch]) {
    println!("--- {} ({}) ---", heading, matches.len());
    for (i, m) in matches.iter().enumerate() {
        println!(
            "{}. [{:.3}] #{} ({})",
            i + 1,
            m.score,
            m.owner_id,
            m.source_type
        );
        for line in m.snippet.lines() {
            println!("    {}", line);
        }
        println!();
    }
}
