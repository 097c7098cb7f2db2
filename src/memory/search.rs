//! Hybrid search: FTS5 keyword relevance fused with recency by Reciprocal
//! Rank Fusion.
//!
//! Both rankings are total orders over the *same* keyword candidate set, so
//! recency can only reorder matches, never introduce them. Cross-repository
//! search fuses a global keyword ranking with an optional semantic index and
//! reports degraded mode when that second signal is missing.

use rusqlite::{Connection, ToSql};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::config::SearchConfig;
use crate::error::{RecallError, Result};
use crate::memory::redact::Redactor;
use crate::memory::sql_limit;
use crate::memory::types::{normalize_timestamp, FileSet, Session, Turn};

// ── Public types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// FTS ordering only.
    Keyword,
    /// FTS relevance fused with recency.
    Hybrid,
}

impl SearchMode {
    /// Resolve the mode from the two mutually exclusive caller flags.
    /// Neither flag means hybrid.
    pub fn from_flags(fts: bool, hybrid: bool) -> Result<Self> {
        match (fts, hybrid) {
            (true, true) => Err(RecallError::invalid_filter(
                "keyword-only and hybrid modes are mutually exclusive",
            )),
            (true, false) => Ok(Self::Keyword),
            _ => Ok(Self::Hybrid),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTarget {
    #[default]
    Turn,
    Session,
}

impl FromStr for SearchTarget {
    type Err = RecallError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "turn" => Ok(Self::Turn),
            "session" => Ok(Self::Session),
            other => Err(RecallError::invalid_filter(format!(
                "unknown search target: {other} (expected turn or session)"
            ))),
        }
    }
}

/// Caller-supplied filters. `file`, `commit` and `agent` apply to turns only.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Substring of any touched file path. Applied after the FTS fetch.
    pub file: Option<String>,
    pub commit: Option<String>,
    /// Session type of the owning session.
    pub agent: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD` or RFC 3339.
    pub since: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub target: SearchTarget,
    pub mode: SearchMode,
    pub filters: SearchFilters,
    pub limit: usize,
}

/// The matched record behind a ranked result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchHit {
    Turn {
        session_id: String,
        turn_number: i64,
        user_message: Option<String>,
        assistant_summary: Option<String>,
        git_commit_hash: Option<String>,
        files_touched: FileSet,
        timestamp: String,
    },
    Session {
        project_id: String,
        session_type: String,
        title: Option<String>,
        summary: Option<String>,
        started_at: String,
        last_activity_at: String,
    },
}

impl SearchHit {
    fn redact(&mut self, redactor: &Redactor) {
        match self {
            Self::Turn {
                user_message,
                assistant_summary,
                ..
            } => {
                redactor.redact_opt(user_message);
                redactor.redact_opt(assistant_summary);
            }
            Self::Session { title, summary, .. } => {
                redactor.redact_opt(title);
                redactor.redact_opt(summary);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FusedResult {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    pub score: f64,
    /// 1-based position in the keyword ranking.
    pub keyword_rank: usize,
    /// 1-based position in the secondary ranking, when one was fused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recency_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_rank: Option<usize>,
    #[serde(flatten)]
    pub hit: SearchHit,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<FusedResult>,
    pub mode: SearchMode,
    pub target: SearchTarget,
    /// Set when a requested secondary signal was unavailable and the ranking
    /// fell back to keyword-only.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

impl SearchResponse {
    fn empty(request: &SearchRequest) -> Self {
        Self {
            results: Vec::new(),
            mode: request.mode,
            target: request.target,
            degraded: false,
            degraded_reason: None,
        }
    }
}

/// One fused entry from [`rrf_fuse`].
#[derive(Debug, Clone, PartialEq)]
pub struct RankFusion {
    pub id: String,
    pub score: f64,
    pub primary_rank: Option<usize>,
    pub secondary_rank: Option<usize>,
}

/// An external ranking over records from several repositories.
pub trait SemanticIndex {
    /// Rank `keys` (formatted `repo:id`) for `query`, best first. May return a
    /// subset; unknown keys are ignored.
    fn rank(&self, query: &str, keys: &[String]) -> anyhow::Result<Vec<String>>;
}

/// A repository database taking part in cross-repository search.
pub struct RepoHandle<'a> {
    pub name: &'a str,
    pub conn: &'a Connection,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Reciprocal Rank Fusion of two best-first id lists:
/// `score = Σ 1/(k + rank)` with 1-based ranks. An id missing from one list
/// gets no contribution from it.
///
/// Sorted by score descending, then by primary rank (absent last), then id.
pub fn rrf_fuse(primary: &[String], secondary: &[String], k: usize) -> Vec<RankFusion> {
    let mut fused: HashMap<&str, RankFusion> = HashMap::new();
    let k = k as f64;

    for (i, id) in primary.iter().enumerate() {
        let entry = fused.entry(id.as_str()).or_insert_with(|| RankFusion {
            id: id.clone(),
            score: 0.0,
            primary_rank: None,
            secondary_rank: None,
        });
        if entry.primary_rank.is_none() {
            entry.primary_rank = Some(i + 1);
            entry.score += 1.0 / (k + (i + 1) as f64);
        }
    }
    for (i, id) in secondary.iter().enumerate() {
        let entry = fused.entry(id.as_str()).or_insert_with(|| RankFusion {
            id: id.clone(),
            score: 0.0,
            primary_rank: None,
            secondary_rank: None,
        });
        if entry.secondary_rank.is_none() {
            entry.secondary_rank = Some(i + 1);
            entry.score += 1.0 / (k + (i + 1) as f64);
        }
    }

    let mut merged: Vec<RankFusion> = fused.into_values().collect();
    merged.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.primary_rank.unwrap_or(usize::MAX).cmp(&b.primary_rank.unwrap_or(usize::MAX)))
            .then_with(|| a.id.cmp(&b.id))
    });
    merged
}

/// Search one repository.
///
/// An empty (or all-punctuation) query returns no results. The candidate
/// fetch is `limit × multiplier`; when the file filter removes more than the
/// multiplier anticipated, fewer than `limit` results come back.
pub fn search(
    conn: &Connection,
    request: &SearchRequest,
    settings: &SearchConfig,
    redactor: Option<&Redactor>,
) -> Result<SearchResponse> {
    let since = validate(request)?;
    let fts_query = escape_fts_query(&request.query);
    if fts_query.is_empty() || request.limit == 0 {
        return Ok(SearchResponse::empty(request));
    }

    let fetch = request.limit.saturating_mul(multiplier(request, settings));
    let candidates = fetch_candidates(conn, &fts_query, request, since.as_deref(), fetch)?;
    let keyword_ids: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();

    let fused = match request.mode {
        SearchMode::Keyword => keyword_only(&keyword_ids, settings.rrf_k),
        SearchMode::Hybrid => {
            let recency_ids = recency_order(&candidates);
            rrf_fuse(&keyword_ids, &recency_ids, settings.rrf_k)
        }
    };

    let mut by_id: HashMap<String, Candidate> =
        candidates.into_iter().map(|c| (c.id.clone(), c)).collect();
    let results: Vec<FusedResult> = fused
        .into_iter()
        .take(request.limit)
        .filter_map(|f| {
            let candidate = by_id.remove(&f.id)?;
            Some(FusedResult {
                id: f.id,
                repo: None,
                score: f.score,
                keyword_rank: f.primary_rank.unwrap_or(0),
                recency_rank: f.secondary_rank,
                semantic_rank: None,
                hit: candidate.hit,
            })
        })
        .collect();

    tracing::info!(
        query = %request.query,
        mode = ?request.mode,
        candidates = keyword_ids.len(),
        results = results.len(),
        "search complete"
    );

    let mut response = SearchResponse {
        results,
        ..SearchResponse::empty(request)
    };
    apply_redaction(&mut response, redactor);
    Ok(response)
}

/// Search several repositories at once.
///
/// Keyword candidates from every repository form one global keyword ranking
/// (bm25 ascending, then newest first, then repository and id). In hybrid
/// mode that ranking is fused with `index`; without an index, or when it
/// fails, the keyword ranking is returned with `degraded` set.
pub fn search_across(
    repos: &[RepoHandle<'_>],
    request: &SearchRequest,
    settings: &SearchConfig,
    index: Option<&dyn SemanticIndex>,
    redactor: Option<&Redactor>,
) -> Result<SearchResponse> {
    let since = validate(request)?;
    let fts_query = escape_fts_query(&request.query);
    if fts_query.is_empty() || request.limit == 0 {
        return Ok(SearchResponse::empty(request));
    }

    let fetch = request.limit.saturating_mul(multiplier(request, settings));
    let mut pooled: Vec<(String, Candidate)> = Vec::new();
    for repo in repos {
        match fetch_candidates(repo.conn, &fts_query, request, since.as_deref(), fetch) {
            Ok(found) => pooled.extend(found.into_iter().map(|c| (repo.name.to_string(), c))),
            Err(e) => {
                tracing::debug!(repo = repo.name, error = %e, "skipping repository");
            }
        }
    }

    pooled.sort_by(|(ra, a), (rb, b)| {
        a.bm25
            .total_cmp(&b.bm25)
            .then_with(|| b.recency.cmp(&a.recency))
            .then_with(|| ra.cmp(rb))
            .then_with(|| a.id.cmp(&b.id))
    });
    let keys: Vec<String> = pooled.iter().map(|(repo, c)| repo_key(repo, &c.id)).collect();

    let mut degraded_reason = None;
    let fused = match (request.mode, index) {
        (SearchMode::Keyword, _) => keyword_only(&keys, settings.rrf_k),
        (SearchMode::Hybrid, None) => {
            degraded_reason = Some("no semantic index available; keyword ranking only".to_string());
            keyword_only(&keys, settings.rrf_k)
        }
        (SearchMode::Hybrid, Some(index)) => match index.rank(&request.query, &keys) {
            Ok(ranked) => {
                let known: std::collections::HashSet<&str> = keys.iter().map(String::as_str).collect();
                let ranked: Vec<String> = ranked
                    .into_iter()
                    .filter(|k| known.contains(k.as_str()))
                    .collect();
                rrf_fuse(&keys, &ranked, settings.rrf_k)
            }
            Err(e) => {
                degraded_reason = Some(format!("semantic index failed: {e}"));
                keyword_only(&keys, settings.rrf_k)
            }
        },
    };
    if let Some(reason) = &degraded_reason {
        tracing::warn!(reason = %reason, "cross-repository search degraded");
    }

    let mut by_key: HashMap<String, (String, Candidate)> = pooled
        .into_iter()
        .map(|(repo, c)| (repo_key(&repo, &c.id), (repo, c)))
        .collect();
    let results: Vec<FusedResult> = fused
        .into_iter()
        .take(request.limit)
        .filter_map(|f| {
            let (repo, candidate) = by_key.remove(&f.id)?;
            Some(FusedResult {
                id: candidate.id,
                repo: Some(repo),
                score: f.score,
                keyword_rank: f.primary_rank.unwrap_or(0),
                recency_rank: None,
                semantic_rank: f.secondary_rank,
                hit: candidate.hit,
            })
        })
        .collect();

    tracing::info!(
        repos = repos.len(),
        results = results.len(),
        degraded = degraded_reason.is_some(),
        "cross-repository search complete"
    );

    let mut response = SearchResponse {
        results,
        degraded: degraded_reason.is_some(),
        degraded_reason,
        ..SearchResponse::empty(request)
    };
    apply_redaction(&mut response, redactor);
    Ok(response)
}

// ── Internals ─────────────────────────────────────────────────────────────────

struct Candidate {
    id: String,
    /// FTS5 rank; lower is better.
    bm25: f64,
    /// Timestamp the recency signal orders by.
    recency: String,
    hit: SearchHit,
}

/// Reject target/filter combinations and normalize `since` before any query runs.
fn validate(request: &SearchRequest) -> Result<Option<String>> {
    let f = &request.filters;
    if request.target == SearchTarget::Session
        && (f.file.is_some() || f.commit.is_some() || f.agent.is_some())
    {
        return Err(RecallError::invalid_filter(
            "file, commit and agent filters only apply to turn search",
        ));
    }
    f.since.as_deref().map(normalize_timestamp).transpose()
}

fn multiplier(request: &SearchRequest, settings: &SearchConfig) -> usize {
    if request.filters.file.is_some() {
        settings.file_filter_multiplier
    } else {
        settings.fetch_multiplier
    }
}

fn repo_key(repo: &str, id: &str) -> String {
    format!("{repo}:{id}")
}

fn keyword_only(ids: &[String], k: usize) -> Vec<RankFusion> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| RankFusion {
            id: id.clone(),
            score: 1.0 / (k as f64 + (i + 1) as f64),
            primary_rank: Some(i + 1),
            secondary_rank: None,
        })
        .collect()
}

/// Candidate ids newest first; equal timestamps keep keyword order.
fn recency_order(candidates: &[Candidate]) -> Vec<String> {
    let mut order: Vec<(usize, &Candidate)> = candidates.iter().enumerate().collect();
    order.sort_by(|(ia, a), (ib, b)| {
        b.recency
            .cmp(&a.recency)
            .then(ia.cmp(ib))
            .then_with(|| a.id.cmp(&b.id))
    });
    order.into_iter().map(|(_, c)| c.id.clone()).collect()
}

fn apply_redaction(response: &mut SearchResponse, redactor: Option<&Redactor>) {
    if let Some(redactor) = redactor {
        for result in &mut response.results {
            result.hit.redact(redactor);
        }
    }
}

/// Keyword candidates in FTS rank order, filters applied.
fn fetch_candidates(
    conn: &Connection,
    fts_query: &str,
    request: &SearchRequest,
    since: Option<&str>,
    fetch: usize,
) -> Result<Vec<Candidate>> {
    match request.target {
        SearchTarget::Turn => fetch_turns(conn, fts_query, &request.filters, since, fetch),
        SearchTarget::Session => fetch_sessions(conn, fts_query, since, fetch),
    }
}

fn fetch_turns(
    conn: &Connection,
    fts_query: &str,
    filters: &SearchFilters,
    since: Option<&str>,
    fetch: usize,
) -> Result<Vec<Candidate>> {
    let mut sql = format!(
        "SELECT {}, fts_turns.rank FROM fts_turns \
         JOIN turns t ON t.rowid = fts_turns.rowid \
         JOIN sessions s ON s.id = t.session_id \
         WHERE fts_turns MATCH ?1",
        Turn::COLUMNS
    );
    let fetch = sql_limit(fetch);
    let mut args: Vec<&dyn ToSql> = vec![&fts_query];
    if let Some(since) = &since {
        args.push(since);
        sql.push_str(&format!(" AND t.timestamp >= ?{}", args.len()));
    }
    if let Some(commit) = &filters.commit {
        args.push(commit);
        sql.push_str(&format!(" AND t.git_commit_hash = ?{}", args.len()));
    }
    if let Some(agent) = &filters.agent {
        args.push(agent);
        sql.push_str(&format!(" AND s.session_type = ?{}", args.len()));
    }
    args.push(&fetch);
    sql.push_str(&format!(" ORDER BY fts_turns.rank, t.id LIMIT ?{}", args.len()));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(args.as_slice(), |row| Ok((Turn::from_row(row)?, row.get::<_, f64>(10)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .filter(|(turn, _)| match &filters.file {
            Some(pattern) => turn.files_touched.iter().any(|f| f.contains(pattern.as_str())),
            None => true,
        })
        .map(|(turn, bm25)| Candidate {
            id: turn.id,
            bm25,
            recency: turn.timestamp.clone(),
            hit: SearchHit::Turn {
                session_id: turn.session_id,
                turn_number: turn.turn_number,
                user_message: turn.user_message,
                assistant_summary: turn.assistant_summary,
                git_commit_hash: turn.git_commit_hash,
                files_touched: turn.files_touched,
                timestamp: turn.timestamp,
            },
        })
        .collect())
}

fn fetch_sessions(
    conn: &Connection,
    fts_query: &str,
    since: Option<&str>,
    fetch: usize,
) -> Result<Vec<Candidate>> {
    let mut sql = format!(
        "SELECT {}, fts_sessions.rank FROM fts_sessions \
         JOIN sessions s ON s.rowid = fts_sessions.rowid \
         WHERE fts_sessions MATCH ?1",
        Session::COLUMNS
    );
    let fetch = sql_limit(fetch);
    let mut args: Vec<&dyn ToSql> = vec![&fts_query];
    if let Some(since) = &since {
        args.push(since);
        sql.push_str(&format!(" AND s.started_at >= ?{}", args.len()));
    }
    args.push(&fetch);
    sql.push_str(&format!(" ORDER BY fts_sessions.rank, s.id LIMIT ?{}", args.len()));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(args.as_slice(), |row| Ok((Session::from_row(row)?, row.get::<_, f64>(9)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .map(|(session, bm25)| Candidate {
            id: session.id,
            bm25,
            recency: session.last_activity_at.clone(),
            hit: SearchHit::Session {
                project_id: session.project_id,
                session_type: session.session_type,
                title: session.title,
                summary: session.summary,
                started_at: session.started_at,
                last_activity_at: session.last_activity_at,
            },
        })
        .collect())
}

/// Escape a user query for FTS5 MATCH syntax.
///
/// Wraps each whitespace-delimited word in double quotes so FTS5 treats them
/// as individual terms (implicit AND). Strips empty tokens.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| format!("\"{}\"", word.replace('"', "")))
        .filter(|w| w != "\"\"")
        .collect::<Vec<_>>()
        .join(" ")
}
