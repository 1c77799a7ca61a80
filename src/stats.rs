//! Database statistics: owner and embedding counts per family, with a
//! per-provenance breakdown. Used by `recall stats`.

use anyhow::Result;

use incident_recall_core::EmbeddingStore;

use crate::config::Config;
use crate::engine::Engine;
use crate::sqlite_store::SqliteEmbeddingStore;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let engine = Engine::open(config).await?;

    let incidents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incidents")
        .fetch_one(&engine.pool)
        .await?;
    let fragments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM runbook_fragments")
        .fetch_one(&engine.pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Incident Recall Database Stats");
    println!("==============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Search:      {}", engine.incident_store.searcher_name());
    println!();

    print_family("Incidents", incidents, &engine.incident_store).await?;
    print_family("Fragments", fragments, &engine.fragment_store).await?;

    engine.close().await;
    Ok(())
}

async fn print_family(label: &str, owners: i64, store: &SqliteEmbeddingStore) -> Result<()> {
    let embeddings = store.count().await?;
    println!("  {}: {}", label, owners);
    println!("    embeddings: {}", embeddings);
    for (source_type, count) in store.count_by_source_type().await? {
        println!("      {:<20} {}", source_type.as_str(), count);
    }
    println!();
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_byte_sizes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
