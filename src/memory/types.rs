//! Record types read from the store.
//!
//! [`Turn`], [`Session`], [`Checkpoint`], and [`Agent`] mirror their tables.
//! The JSON `files_touched` column is parsed once here into a [`FileSet`];
//! nothing downstream sees the raw text.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::{RecallError, Result};

/// Ordered, duplicate-free set of repository-relative file paths.
pub type FileSet = BTreeSet<String>;

/// A captured exchange within a session.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub id: String,
    pub session_id: String,
    /// Ordinal position, unique within the session.
    pub turn_number: i64,
    pub user_message: Option<String>,
    pub assistant_summary: Option<String>,
    pub git_commit_hash: Option<String>,
    pub files_touched: FileSet,
    pub timestamp: String,
    /// `None` until consolidation has compressed this turn's content.
    pub consolidated_at: Option<String>,
    pub consolidated_summary: Option<String>,
}

impl Turn {
    /// Column list matching [`Turn::from_row`], for queries aliasing `turns` as `t`.
    pub(crate) const COLUMNS: &'static str = "t.id, t.session_id, t.turn_number, t.user_message, \
         t.assistant_summary, t.git_commit_hash, t.files_touched, t.timestamp, \
         t.consolidated_at, t.consolidated_summary";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let files_raw: Option<String> = row.get(6)?;
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            turn_number: row.get(2)?,
            user_message: row.get(3)?,
            assistant_summary: row.get(4)?,
            git_commit_hash: row.get(5)?,
            files_touched: parse_files_touched(files_raw.as_deref()),
            timestamp: row.get(7)?,
            consolidated_at: row.get(8)?,
            consolidated_summary: row.get(9)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub agent_id: Option<String>,
    pub session_type: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub last_activity_at: String,
    pub title: Option<String>,
    pub summary: Option<String>,
}

impl Session {
    pub(crate) const COLUMNS: &'static str = "s.id, s.project_id, s.agent_id, s.session_type, \
         s.started_at, s.ended_at, s.last_activity_at, s.session_title, s.session_summary";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            agent_id: row.get(2)?,
            session_type: row.get(3)?,
            started_at: row.get(4)?,
            ended_at: row.get(5)?,
            last_activity_at: row.get(6)?,
            title: row.get(7)?,
            summary: row.get(8)?,
        })
    }
}

/// A snapshot anchored to a commit, optionally chained to a prior checkpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Checkpoint {
    pub id: String,
    pub session_id: String,
    pub git_commit_hash: String,
    pub git_branch: Option<String>,
    pub parent_checkpoint_id: Option<String>,
    pub created_at: String,
}

impl Checkpoint {
    pub(crate) const COLUMNS: &'static str = "c.id, c.session_id, c.git_commit_hash, \
         c.git_branch, c.parent_checkpoint_id, c.created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            git_commit_hash: row.get(2)?,
            git_branch: row.get(3)?,
            parent_checkpoint_id: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: String,
    pub parent_agent_id: Option<String>,
    pub agent_type: String,
    pub role: Option<String>,
    pub name: Option<String>,
}

impl Agent {
    pub(crate) const COLUMNS: &'static str = "a.id, a.parent_agent_id, a.agent_type, a.role, a.name";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            parent_agent_id: row.get(1)?,
            agent_type: row.get(2)?,
            role: row.get(3)?,
            name: row.get(4)?,
        })
    }
}

/// Parse the stored JSON array of touched files.
///
/// Missing, malformed, or non-array values yield an empty set; non-string
/// elements are dropped.
pub fn parse_files_touched(raw: Option<&str>) -> FileSet {
    let Some(raw) = raw else {
        return FileSet::new();
    };
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Ok(_) => FileSet::new(),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed files_touched");
            FileSet::new()
        }
    }
}

/// Current time as stored in the record store: RFC 3339, UTC, second precision.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Normalize a caller-supplied date bound into the stored timestamp format.
///
/// Accepts `YYYY-MM-DD` (midnight UTC) or any RFC 3339 timestamp.
pub fn normalize_timestamp(input: &str) -> Result<String> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(format_timestamp(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| format_timestamp(dt.and_utc()))
        .ok_or_else(|| {
            RecallError::invalid_filter(format!(
                "expected YYYY-MM-DD or RFC 3339 timestamp, got {input:?}"
            ))
        })
}
