//! SQLite database connection management.
//!
//! Provides a connection pool to the SQLite database with WAL mode
//! enabled for concurrent read/write performance. The database file
//! and its parent directories are created automatically if they don't exist.
//!
//! # Foreign keys
//!
//! Foreign-key enforcement is switched on for every connection. Embedding
//! rows reference their owner with `ON DELETE CASCADE`, and an insert for
//! a missing owner fails with a foreign-key violation that the stores
//! report as `OwnerNotFound`.
//!
//! # sqlite-vec
//!
//! When the configured search strategy is `native`, the sqlite-vec
//! extension is registered as an SQLite auto-extension before the pool
//! opens, so every pooled connection has `vec_distance_cosine`.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Once;

use crate::config::{Config, SearchStrategy};

/// Create a connection pool to the configured SQLite database.
///
/// - Creates the database file and parent directories if they don't exist.
/// - Enables WAL journal mode and foreign keys.
/// - Registers sqlite-vec first when `search.strategy = "native"`.
/// - Returns a pool with up to 5 connections.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if config.search.strategy == SearchStrategy::Native {
        register_sqlite_vec();
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Register sqlite-vec as an auto-extension for this process (once).
///
/// Affects connections opened after the call; connections already in a
/// pool do not gain the extension.
pub fn register_sqlite_vec() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // SAFETY: `sqlite3_vec_init` is the extension entry point exported by
        // the statically linked sqlite-vec library; it has the signature
        // SQLite expects of an auto-extension.
        unsafe {
            libsqlite3_sys::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
        tracing::debug!("registered sqlite-vec auto-extension");
    });
}
