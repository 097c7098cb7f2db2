//! Spreading activation over the implicit turn similarity graph.
//!
//! Two turns are adjacent when they touch a common file (weighted by the
//! Jaccard similarity of their file sets) or share a commit (weight 1.0).
//! Traversal is frontier-based BFS from one or more seed turns; a neighbor
//! found through a parent at hop `h` scores `parent × edge × decay^h`, so
//! hop-1 neighbors carry their raw edge weight.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{RecallError, Result};
use crate::memory::store;
use crate::memory::types::{FileSet, Turn};

// ── Public types ──────────────────────────────────────────────────────────────

/// Where activation starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationSeed {
    /// A single turn, by id or unambiguous id prefix.
    Turn(String),
    /// Every turn of a session, each at weight 1.0.
    Session(String),
}

/// Why a turn was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeReason {
    SharedFiles,
    SharedCommit,
}

impl EdgeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SharedFiles => "shared_files",
            Self::SharedCommit => "shared_commit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActivationParams {
    pub seed: ActivationSeed,
    /// Restrict reachable turns to one session. Seeds are unaffected.
    pub session: Option<String>,
    pub max_hops: usize,
    pub limit: usize,
    /// Per-hop multiplier, in (0, 1).
    pub decay: f64,
    /// Turns that may never be reached or traversed through.
    pub exclude: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivationResult {
    pub turn_id: String,
    pub session_id: String,
    pub turn_number: i64,
    pub weight: f64,
    pub hop: usize,
    pub reason: EdgeReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Run spreading activation from `params.seed`.
///
/// Returns up to `params.limit` turns ordered by weight descending, then hop
/// ascending, then turn id. An unknown seed is [`RecallError::NotFound`];
/// no reachable turns is an empty list.
pub fn activate(conn: &Connection, params: &ActivationParams) -> Result<Vec<ActivationResult>> {
    let seeds = resolve_seeds(conn, &params.seed)?;
    let seed_ids: HashSet<&str> = seeds.iter().map(|t| t.id.as_str()).collect();

    let candidates: Vec<Turn> = load_candidates(conn, params.session.as_deref(), &params.exclude)?
        .into_iter()
        .filter(|t| !seed_ids.contains(t.id.as_str()))
        .collect();

    let graph = TurnGraph::new(&seeds, &candidates);
    let found = graph.spread(params.max_hops, params.decay);

    let mut results: Vec<ActivationResult> = found
        .into_iter()
        .map(|(idx, hit)| {
            let turn = &candidates[idx];
            ActivationResult {
                turn_id: turn.id.clone(),
                session_id: turn.session_id.clone(),
                turn_number: turn.turn_number,
                weight: hit.weight,
                hop: hit.hop,
                reason: hit.reason,
                preview: turn
                    .assistant_summary
                    .clone()
                    .or_else(|| turn.user_message.clone()),
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then(a.hop.cmp(&b.hop))
            .then_with(|| a.turn_id.cmp(&b.turn_id))
    });
    results.truncate(params.limit);

    tracing::info!(
        seeds = seeds.len(),
        candidates = candidates.len(),
        results = results.len(),
        "activation complete"
    );
    Ok(results)
}

/// Jaccard similarity of two file sets; 0.0 when both are empty.
pub fn jaccard(a: &FileSet, b: &FileSet) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

// ── Internals ─────────────────────────────────────────────────────────────────

fn resolve_seeds(conn: &Connection, seed: &ActivationSeed) -> Result<Vec<Turn>> {
    match seed {
        ActivationSeed::Turn(id) => Ok(vec![store::resolve_turn(conn, id)?]),
        ActivationSeed::Session(id) => {
            if store::get_session(conn, id)?.is_none() {
                return Err(RecallError::not_found("session", id.as_str()));
            }
            store::session_turns(conn, id)
        }
    }
}

/// Every turn eligible to be reached.
///
/// This loads the whole candidate set (one session, or the entire store) up
/// front, so the cost of an activation grows with store size rather than with
/// `max_hops`. Exclusions are dropped after the read, never bound as
/// statement parameters.
fn load_candidates(
    conn: &Connection,
    session: Option<&str>,
    exclude: &BTreeSet<String>,
) -> Result<Vec<Turn>> {
    let mut sql = format!("SELECT {} FROM turns t", Turn::COLUMNS);
    let mut args: Vec<&str> = Vec::new();
    if let Some(session) = session {
        args.push(session);
        sql.push_str(" WHERE t.session_id = ?1");
    }
    sql.push_str(" ORDER BY t.id");

    let mut stmt = conn.prepare(&sql)?;
    let turns = stmt
        .query_map(rusqlite::params_from_iter(args), Turn::from_row)?
        .filter(|row| !matches!(row, Ok(turn) if exclude.contains(&turn.id)))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(turns)
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    weight: f64,
    hop: usize,
    reason: EdgeReason,
}

/// A node's features: its own file set and commit.
struct Features<'a> {
    files: &'a FileSet,
    commit: Option<&'a str>,
}

impl<'a> From<&'a Turn> for Features<'a> {
    fn from(turn: &'a Turn) -> Self {
        Self {
            files: &turn.files_touched,
            commit: turn.git_commit_hash.as_deref(),
        }
    }
}

/// Inverted file/commit indices over the candidate pool.
struct TurnGraph<'a> {
    seeds: Vec<Features<'a>>,
    candidates: Vec<Features<'a>>,
    by_file: HashMap<&'a str, Vec<usize>>,
    by_commit: HashMap<&'a str, Vec<usize>>,
}

#[derive(Clone, Copy)]
enum Node {
    Seed(usize),
    Candidate(usize),
}

impl<'a> TurnGraph<'a> {
    fn new(seeds: &'a [Turn], candidates: &'a [Turn]) -> Self {
        let mut by_file: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut by_commit: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, turn) in candidates.iter().enumerate() {
            for file in &turn.files_touched {
                by_file.entry(file.as_str()).or_default().push(idx);
            }
            if let Some(commit) = turn.git_commit_hash.as_deref() {
                by_commit.entry(commit).or_default().push(idx);
            }
        }
        Self {
            seeds: seeds.iter().map(Features::from).collect(),
            candidates: candidates.iter().map(Features::from).collect(),
            by_file,
            by_commit,
        }
    }

    fn features(&self, node: Node) -> &Features<'a> {
        match node {
            Node::Seed(i) => &self.seeds[i],
            Node::Candidate(i) => &self.candidates[i],
        }
    }

    /// Candidates adjacent to `node` with their edge weight and reason.
    /// A shared commit outranks file overlap; the two never add.
    fn neighbors(&self, node: Node) -> BTreeMap<usize, (f64, EdgeReason)> {
        let me = self.features(node);
        let mut out = BTreeMap::new();

        for file in me.files {
            for &idx in self.by_file.get(file.as_str()).into_iter().flatten() {
                out.entry(idx).or_insert_with(|| {
                    (jaccard(me.files, self.candidates[idx].files), EdgeReason::SharedFiles)
                });
            }
        }
        if let Some(commit) = me.commit {
            for &idx in self.by_commit.get(commit).into_iter().flatten() {
                out.insert(idx, (1.0, EdgeReason::SharedCommit));
            }
        }
        if let Node::Candidate(own) = node {
            out.remove(&own);
        }
        out
    }

    /// BFS with a per-hop frontier. The visited set is only extended once a
    /// whole hop has been expanded, so same-hop siblings never suppress each
    /// other.
    fn spread(&self, max_hops: usize, decay: f64) -> BTreeMap<usize, Hit> {
        let mut found: BTreeMap<usize, Hit> = BTreeMap::new();
        let mut visited: HashSet<usize> = HashSet::new();
        let mut frontier: Vec<(Node, f64)> =
            (0..self.seeds.len()).map(|i| (Node::Seed(i), 1.0)).collect();

        for hop in 1..=max_hops {
            if frontier.is_empty() {
                break;
            }
            let attenuation = decay.powi((hop - 1) as i32);
            let mut discovered: BTreeMap<usize, Hit> = BTreeMap::new();

            for &(parent, parent_weight) in &frontier {
                for (idx, (edge, reason)) in self.neighbors(parent) {
                    if visited.contains(&idx) {
                        continue;
                    }
                    let weight = parent_weight * edge * attenuation;
                    let hit = Hit { weight, hop, reason };
                    discovered
                        .entry(idx)
                        .and_modify(|best| {
                            if weight > best.weight {
                                *best = hit;
                            }
                        })
                        .or_insert(hit);
                }
            }

            tracing::debug!(hop, frontier = frontier.len(), discovered = discovered.len(), "activation hop");

            visited.extend(discovered.keys().copied());
            frontier = discovered
                .iter()
                .map(|(&idx, hit)| (Node::Candidate(idx), hit.weight))
                .collect();
            found.extend(discovered);
        }

        found
    }
}
