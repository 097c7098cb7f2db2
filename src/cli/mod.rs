pub mod activate;
pub mod agents;
pub mod consolidate;
pub mod graph;
pub mod search;
pub mod stats;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::RecollectConfig;

/// Open the configured record store.
fn open_store(config: &RecollectConfig) -> Result<Connection> {
    let db_path = config.resolved_db_path();
    crate::db::open_database(&db_path)
}

/// Pretty-print any result as JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

/// First line of `text`, cut to `max` chars with an ellipsis.
fn preview(text: Option<&str>, max: usize) -> String {
    let line = text.and_then(|t| t.lines().next()).unwrap_or("").trim();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

/// Short display form of an id.
fn short_id(id: &str) -> &str {
    match id.char_indices().nth(12) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
