//! # Incident Recall CLI (`recall`)
//!
//! Operator interface to the incident retrieval engine: create the schema,
//! generate embeddings for incidents and runbook fragments, and run
//! similarity retrieval from the command line.
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite database and run schema migrations |
//! | `recall embed incident <id>` | Embed one incident |
//! | `recall embed fragment <id>` | Embed one runbook fragment |
//! | `recall embed batch` | Embed listed ids, skipping stale ones |
//! | `recall embed all` | Embed every incident and fragment |
//! | `recall embed clear` | Delete all embeddings |
//! | `recall retrieve incident` | Find incidents and fragments similar to an incident |
//! | `recall retrieve fragment` | Find incidents and fragments similar to a fragment |
//! | `recall stats` | Show record and embedding counts |
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use incident_recall::config;
use incident_recall::{embed_cmd, migrate, retrieve_cmd, stats};
use incident_recall_core::models::{FragmentCandidate, IncidentCandidate};

/// Incident Recall: embedding-backed similarity retrieval over incidents
/// and runbook fragments.
#[derive(Parser)]
#[command(name = "recall", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Generate or clear embeddings.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Retrieve similar incidents and runbook fragments for a candidate.
    Retrieve {
        #[command(subcommand)]
        target: RetrieveTarget,
    },

    /// Show record and embedding counts.
    Stats,
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed one incident.
    Incident {
        id: i64,
        /// Tag the embedding VERIFIED_DIAGNOSIS instead of RAW_INCIDENT.
        #[arg(long)]
        verified: bool,
    },
    /// Embed one runbook fragment.
    Fragment { id: i64 },
    /// Embed the listed ids. Missing ids are skipped; other failures abort.
    Batch {
        #[arg(long, value_delimiter = ',')]
        incidents: Vec<i64>,
        #[arg(long, value_delimiter = ',')]
        fragments: Vec<i64>,
    },
    /// Embed every incident and fragment in the database.
    All,
    /// Delete every embedding from both stores.
    Clear,
}

#[derive(Subcommand)]
enum RetrieveTarget {
    /// Query with an incident-shaped candidate.
    Incident {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        status: Option<String>,
        /// Print the retrieval context as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Query with a fragment-shaped candidate.
    Fragment {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Print the retrieval context as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Embed { action } => match action {
            EmbedAction::Incident { id, verified } => {
                embed_cmd::run_embed_incident(&cfg, id, verified).await?;
            }
            EmbedAction::Fragment { id } => {
                embed_cmd::run_embed_fragment(&cfg, id).await?;
            }
            EmbedAction::Batch {
                incidents,
                fragments,
            } => {
                embed_cmd::run_embed_batch(&cfg, &incidents, &fragments).await?;
            }
            EmbedAction::All => {
                embed_cmd::run_embed_all(&cfg).await?;
            }
            EmbedAction::Clear => {
                embed_cmd::run_embed_clear(&cfg).await?;
            }
        },
        Commands::Retrieve { target } => match target {
            RetrieveTarget::Incident {
                title,
                description,
                severity,
                status,
                json,
            } => {
                let candidate = IncidentCandidate {
                    title,
                    description,
                    severity,
                    status,
                };
                retrieve_cmd::run_retrieve_incident(&cfg, &candidate, json).await?;
            }
            RetrieveTarget::Fragment {
                title,
                content,
                tags,
                json,
            } => {
                let candidate = FragmentCandidate {
                    title,
                    content,
                    tags,
                };
                retrieve_cmd::run_retrieve_fragment(&cfg, &candidate, json).await?;
            }
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
