pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use crate::config::{expand_tilde, RepoEntry};
use std::time::Duration;

/// Open (or create) the record store at the given path with the schema
/// initialized and all migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL lets readers proceed while the capture path appends turns
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(5000))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory record store with the full schema, for tests and
/// throwaway callers.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Open every registered repository store. Stores that cannot be opened are
/// skipped so one broken repository does not hide the others.
pub fn open_repositories(repos: &[RepoEntry]) -> Vec<(String, Connection)> {
    repos
        .iter()
        .filter_map(|repo| match open_database(expand_tilde(&repo.db_path)) {
            Ok(conn) => Some((repo.name.clone(), conn)),
            Err(e) => {
                tracing::debug!(repo = %repo.name, error = %e, "skipping repository");
                None
            }
        })
        .collect()
}

/// Row counts per table, shown by `recollect stats`.
#[derive(Debug, serde::Serialize)]
pub struct StoreCounts {
    pub schema_version: u32,
    pub sessions: i64,
    pub turns: i64,
    pub consolidated_turns: i64,
    pub checkpoints: i64,
    pub agents: i64,
}

pub fn store_counts(conn: &Connection) -> Result<StoreCounts> {
    let count = |sql: &str| -> Result<i64> {
        conn.query_row(sql, [], |row| row.get(0))
            .with_context(|| format!("count query failed: {sql}"))
    };
    Ok(StoreCounts {
        schema_version: migrations::get_schema_version(conn)?,
        sessions: count("SELECT COUNT(*) FROM sessions")?,
        turns: count("SELECT COUNT(*) FROM turns")?,
        consolidated_turns: count("SELECT COUNT(*) FROM turns WHERE consolidated_at IS NOT NULL")?,
        checkpoints: count("SELECT COUNT(*) FROM checkpoints")?,
        agents: count("SELECT COUNT(*) FROM agents")?,
    })
}
