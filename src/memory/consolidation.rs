//! Consolidation: compress old turn content into a compact summary.
//!
//! Selection ([`find_eligible`]) is a pure read. Execution handles one turn at
//! a time: compute the summary, commit the state transition (summary plus
//! `consolidated_at`, `turn_content` row removed) in one transaction, and only
//! then remove the external file. A failed removal leaves the turn correctly
//! marked and is reported for that turn alone.
//!
//! Callers must not consolidate the same range concurrently.

use rusqlite::{params, Connection};
use serde::Serialize;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{RecallError, Result};
use crate::memory::{sql_limit, truncate_chars};
use crate::memory::types::{normalize_timestamp, now_timestamp, Turn};

// ── Content store seam ────────────────────────────────────────────────────────

/// Access to externally stored turn content.
pub trait ContentStore {
    fn read(&self, path: &Path) -> io::Result<String>;
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Content files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsContentStore;

impl ContentStore for FsContentStore {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

// ── Public types ──────────────────────────────────────────────────────────────

/// A turn that still has external content and is old enough to consolidate.
#[derive(Debug, Clone, Serialize)]
pub struct EligibleTurn {
    #[serde(flatten)]
    pub turn: Turn,
    pub content_path: String,
}

#[derive(Debug, Clone)]
pub struct ConsolidateOptions {
    /// Exclusive upper bound, `YYYY-MM-DD` or RFC 3339.
    pub before: String,
    pub session: Option<String>,
    pub limit: usize,
    /// `false` previews the batch without touching anything.
    pub execute: bool,
    pub summary_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Dry run: would be consolidated.
    Eligible,
    Consolidated,
    /// Not consolidated; the turn is unchanged.
    Skipped { reason: String },
    /// Marked consolidated, but the content file could not be removed.
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationRecord {
    pub turn_id: String,
    pub content_path: String,
    #[serde(flatten)]
    pub outcome: TurnOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consolidated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationReport {
    pub execute: bool,
    pub candidates: usize,
    pub records: Vec<ConsolidationRecord>,
}

impl ConsolidationReport {
    fn count(&self, pred: impl Fn(&TurnOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn consolidated(&self) -> usize {
        self.count(|o| matches!(o, TurnOutcome::Consolidated))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TurnOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TurnOutcome::Failed { .. }))
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Turns with a `turn_content` row, not yet consolidated, and strictly older
/// than `before`; oldest first. Never mutates.
pub fn find_eligible(
    conn: &Connection,
    before: &str,
    session: Option<&str>,
    limit: usize,
) -> Result<Vec<EligibleTurn>> {
    let before = normalize_timestamp(before)?;
    let sql = format!(
        "SELECT {}, tc.content_path FROM turns t \
         JOIN turn_content tc ON tc.turn_id = t.id \
         WHERE t.consolidated_at IS NULL AND t.timestamp < ?1 \
         AND (?2 IS NULL OR t.session_id = ?2) \
         ORDER BY t.timestamp ASC, t.id ASC LIMIT ?3",
        Turn::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![before, session, sql_limit(limit)], |row| {
            Ok(EligibleTurn {
                turn: Turn::from_row(row)?,
                content_path: row.get(10)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Consolidate (or, without `execute`, preview) the eligible batch.
///
/// Only filter errors and the initial selection can fail the call; every
/// per-turn problem becomes that turn's outcome.
pub fn consolidate(
    conn: &mut Connection,
    content: &dyn ContentStore,
    content_root: &Path,
    opts: &ConsolidateOptions,
) -> Result<ConsolidationReport> {
    let eligible = find_eligible(conn, &opts.before, opts.session.as_deref(), opts.limit)?;
    tracing::info!(
        candidates = eligible.len(),
        execute = opts.execute,
        before = %opts.before,
        "consolidation started"
    );

    let mut records = Vec::with_capacity(eligible.len());
    for candidate in &eligible {
        let record = match resolve_content_path(content_root, &candidate.content_path) {
            Err(e) => {
                tracing::warn!(turn = %candidate.turn.id, error = %e, "skipping turn");
                skipped(candidate, e.to_string())
            }
            Ok(_) if !opts.execute => ConsolidationRecord {
                turn_id: candidate.turn.id.clone(),
                content_path: candidate.content_path.clone(),
                outcome: TurnOutcome::Eligible,
                summary: None,
                consolidated_at: None,
            },
            Ok(path) => consolidate_one(conn, content, candidate, &path, opts.summary_chars),
        };
        records.push(record);
    }

    let report = ConsolidationReport {
        execute: opts.execute,
        candidates: eligible.len(),
        records,
    };
    tracing::info!(
        consolidated = report.consolidated(),
        skipped = report.skipped(),
        failed = report.failed(),
        "consolidation finished"
    );
    Ok(report)
}

/// Summary kept in place of the full content: assistant summary, else user
/// message, else the first non-empty content line.
pub fn compact_summary(turn: &Turn, content: Option<&str>, max_chars: usize) -> Option<String> {
    let non_empty = |s: &Option<String>| {
        s.as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
    };
    non_empty(&turn.assistant_summary)
        .or_else(|| non_empty(&turn.user_message))
        .or_else(|| {
            content?
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(String::from)
        })
        .map(|s| truncate_chars(&s, max_chars))
}

/// Join `relative` onto `root` lexically, rejecting absolute paths and any
/// `..` that climbs out of the root. If the target exists, its canonical
/// form must also stay under the canonical root.
pub fn resolve_content_path(root: &Path, relative: &str) -> Result<PathBuf> {
    let violation = || RecallError::PathViolation {
        path: relative.to_string(),
    };

    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(violation());
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return Err(violation()),
        }
    }
    if depth == 0 {
        return Err(violation());
    }

    if let (Ok(real), Ok(real_root)) = (resolved.canonicalize(), root.canonicalize()) {
        if !real.starts_with(&real_root) {
            return Err(violation());
        }
    }
    Ok(resolved)
}

// ── Internals ─────────────────────────────────────────────────────────────────

fn skipped(candidate: &EligibleTurn, reason: String) -> ConsolidationRecord {
    ConsolidationRecord {
        turn_id: candidate.turn.id.clone(),
        content_path: candidate.content_path.clone(),
        outcome: TurnOutcome::Skipped { reason },
        summary: None,
        consolidated_at: None,
    }
}

fn consolidate_one(
    conn: &mut Connection,
    content: &dyn ContentStore,
    candidate: &EligibleTurn,
    path: &Path,
    summary_chars: usize,
) -> ConsolidationRecord {
    let turn = &candidate.turn;

    // 1. summary from what is stored now
    let text = match content.read(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::debug!(turn = %turn.id, error = %e, "content unreadable, summarizing metadata");
            None
        }
    };
    let summary = compact_summary(turn, text.as_deref(), summary_chars);

    // 2. durable state transition
    let consolidated_at = now_timestamp();
    match mark_consolidated(conn, &turn.id, &consolidated_at, summary.as_deref()) {
        Ok(true) => {}
        Ok(false) => return skipped(candidate, "already consolidated".to_string()),
        Err(e) => {
            tracing::warn!(turn = %turn.id, error = %e, "failed to record consolidation");
            return skipped(candidate, e.to_string());
        }
    }

    // 3. destructive step, isolated
    let outcome = match content.remove(path) {
        Ok(()) => TurnOutcome::Consolidated,
        Err(e) if e.kind() == io::ErrorKind::NotFound => TurnOutcome::Consolidated,
        Err(source) => {
            let err = RecallError::ContentIo {
                path: path.to_path_buf(),
                source,
            };
            tracing::warn!(turn = %turn.id, error = %err, "content removal failed after consolidation");
            TurnOutcome::Failed {
                error: err.to_string(),
            }
        }
    };

    ConsolidationRecord {
        turn_id: turn.id.clone(),
        content_path: candidate.content_path.clone(),
        outcome,
        summary,
        consolidated_at: Some(consolidated_at),
    }
}

/// Returns `false` if the turn was consolidated by someone else meanwhile.
fn mark_consolidated(
    conn: &mut Connection,
    turn_id: &str,
    consolidated_at: &str,
    summary: Option<&str>,
) -> Result<bool> {
    let tx = conn.transaction()?;
    let updated = tx.execute(
        "UPDATE turns SET consolidated_at = ?1, consolidated_summary = ?2 \
         WHERE id = ?3 AND consolidated_at IS NULL",
        params![consolidated_at, summary, turn_id],
    )?;
    if updated == 0 {
        return Ok(false);
    }
    tx.execute("DELETE FROM turn_content WHERE turn_id = ?1", params![turn_id])?;
    tx.commit()?;
    Ok(true)
}
