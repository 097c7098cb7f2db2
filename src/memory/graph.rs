//! Knowledge graph projection of the record store.
//!
//! The filtered, newest-first turn set decides everything: sessions, agents,
//! and checkpoints enter only through those turns' sessions, and commits and
//! files only through those turns (or the included checkpoints). Nodes are
//! keyed by kind plus natural key and edges by `(relation, source, target)`,
//! so rebuilding from unchanged data always yields the same sets.

use rusqlite::{Connection, Row, ToSql};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::Result;
use crate::memory::{sql_limit, truncate_chars};
use crate::memory::types::{normalize_timestamp, Agent, Checkpoint, Session, Turn};

// ── Public types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Session,
    Turn,
    Commit,
    File,
    Agent,
    Checkpoint,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Turn => "turn",
            Self::Commit => "commit",
            Self::File => "file",
            Self::Agent => "agent",
            Self::Checkpoint => "checkpoint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// session → turn
    Contains,
    /// turn → commit
    CommittedVia,
    /// turn → file
    Touched,
    /// agent → session
    RanSession,
    /// checkpoint → commit
    AnchorsCommit,
    /// session → checkpoint
    HasCheckpoint,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::CommittedVia => "committed_via",
            Self::Touched => "touched",
            Self::RanSession => "ran_session",
            Self::AnchorsCommit => "anchors_commit",
            Self::HasCheckpoint => "has_checkpoint",
        }
    }
}

/// Node identity: kind plus natural key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub key: String,
}

impl NodeKey {
    pub fn new(kind: NodeKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    /// `kind:key`, referenced by edges.
    pub id: String,
    pub kind: NodeKind,
    pub key: String,
    pub label: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<&'static str, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GraphEdge {
    pub relation: Relation,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_by_kind: BTreeMap<NodeKind, usize>,
    pub edges_by_relation: BTreeMap<Relation, usize>,
}

#[derive(Debug, Clone)]
pub struct GraphParams {
    /// Inclusive lower bound on turn timestamps.
    pub since: Option<String>,
    pub session: Option<String>,
    pub turn_limit: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Build the graph for the newest `turn_limit` turns matching the filters.
///
/// An empty turn set (including an unknown session) is an empty graph. A
/// malformed `since` is an [`InvalidFilter`](crate::error::RecallError::InvalidFilter).
pub fn build_graph(conn: &Connection, params: &GraphParams) -> Result<KnowledgeGraph> {
    let since = params.since.as_deref().map(normalize_timestamp).transpose()?;
    let turns = load_turns(conn, params.session.as_deref(), since.as_deref(), params.turn_limit)?;
    if turns.is_empty() {
        tracing::info!("knowledge graph empty: no qualifying turns");
        return Ok(KnowledgeGraph::default());
    }

    let session_ids: Vec<&str> = turns
        .iter()
        .map(|t| t.session_id.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let sessions: Vec<Session> = query_in(
        conn,
        &format!("SELECT {} FROM sessions s WHERE s.id IN ({{}}) ORDER BY s.id", Session::COLUMNS),
        &session_ids,
        Session::from_row,
    )?;
    let agent_ids: Vec<&str> = sessions
        .iter()
        .filter_map(|s| s.agent_id.as_deref())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let agents: Vec<Agent> = query_in(
        conn,
        &format!("SELECT {} FROM agents a WHERE a.id IN ({{}}) ORDER BY a.id", Agent::COLUMNS),
        &agent_ids,
        Agent::from_row,
    )?;
    let checkpoints: Vec<Checkpoint> = query_in(
        conn,
        &format!(
            "SELECT {} FROM checkpoints c WHERE c.session_id IN ({{}}) ORDER BY c.id",
            Checkpoint::COLUMNS
        ),
        &session_ids,
        Checkpoint::from_row,
    )?;

    let mut builder = GraphBuilder::default();

    for session in &sessions {
        let mut props = BTreeMap::new();
        props.insert("session_type", session.session_type.clone());
        let label = session
            .title
            .clone()
            .unwrap_or_else(|| truncate_chars(&session.id, 12));
        builder.node(NodeKind::Session, &session.id, label, props);
    }

    for agent in &agents {
        let mut props = BTreeMap::new();
        props.insert("agent_type", agent.agent_type.clone());
        if let Some(role) = &agent.role {
            props.insert("role", role.clone());
        }
        let label = agent
            .name
            .clone()
            .unwrap_or_else(|| truncate_chars(&agent.id, 12));
        builder.node(NodeKind::Agent, &agent.id, label, props);
    }
    for session in &sessions {
        if let Some(agent_id) = session.agent_id.as_deref() {
            builder.edge(
                Relation::RanSession,
                NodeKey::new(NodeKind::Agent, agent_id),
                NodeKey::new(NodeKind::Session, &session.id),
            );
        }
    }

    for turn in &turns {
        let label = truncate_chars(turn.user_message.as_deref().unwrap_or(&turn.id), 50);
        builder.node(NodeKind::Turn, &turn.id, label, BTreeMap::new());
        let turn_key = NodeKey::new(NodeKind::Turn, &turn.id);
        builder.edge(
            Relation::Contains,
            NodeKey::new(NodeKind::Session, &turn.session_id),
            turn_key.clone(),
        );

        if let Some(commit) = turn.git_commit_hash.as_deref() {
            builder.node(NodeKind::Commit, commit, truncate_chars(commit, 8), BTreeMap::new());
            builder.edge(
                Relation::CommittedVia,
                turn_key.clone(),
                NodeKey::new(NodeKind::Commit, commit),
            );
        }

        for file in &turn.files_touched {
            let label = file.rsplit('/').next().unwrap_or(file).to_string();
            builder.node(NodeKind::File, file, label, BTreeMap::new());
            builder.edge(
                Relation::Touched,
                turn_key.clone(),
                NodeKey::new(NodeKind::File, file),
            );
        }
    }

    for checkpoint in &checkpoints {
        let mut props = BTreeMap::new();
        if let Some(branch) = &checkpoint.git_branch {
            props.insert("git_branch", branch.clone());
        }
        builder.node(
            NodeKind::Checkpoint,
            &checkpoint.id,
            truncate_chars(&checkpoint.id, 12),
            props,
        );
        let commit = checkpoint.git_commit_hash.as_str();
        builder.node(NodeKind::Commit, commit, truncate_chars(commit, 8), BTreeMap::new());
        builder.edge(
            Relation::AnchorsCommit,
            NodeKey::new(NodeKind::Checkpoint, &checkpoint.id),
            NodeKey::new(NodeKind::Commit, commit),
        );
        builder.edge(
            Relation::HasCheckpoint,
            NodeKey::new(NodeKind::Session, &checkpoint.session_id),
            NodeKey::new(NodeKind::Checkpoint, &checkpoint.id),
        );
    }

    let graph = builder.finish();
    tracing::info!(
        turns = turns.len(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "knowledge graph built"
    );
    Ok(graph)
}

/// Totals plus per-kind and per-relation counts.
pub fn graph_stats(graph: &KnowledgeGraph) -> GraphStats {
    let mut nodes_by_kind = BTreeMap::new();
    for node in &graph.nodes {
        *nodes_by_kind.entry(node.kind).or_insert(0) += 1;
    }
    let mut edges_by_relation = BTreeMap::new();
    for edge in &graph.edges {
        *edges_by_relation.entry(edge.relation).or_insert(0) += 1;
    }
    GraphStats {
        total_nodes: graph.nodes.len(),
        total_edges: graph.edges.len(),
        nodes_by_kind,
        edges_by_relation,
    }
}

// ── Internals ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct GraphBuilder {
    nodes: BTreeMap<NodeKey, GraphNode>,
    edges: BTreeSet<GraphEdge>,
}

impl GraphBuilder {
    /// First insertion wins.
    fn node(
        &mut self,
        kind: NodeKind,
        key: &str,
        label: String,
        properties: BTreeMap<&'static str, String>,
    ) {
        let node_key = NodeKey::new(kind, key);
        if self.nodes.contains_key(&node_key) {
            return;
        }
        let node = GraphNode {
            id: node_key.to_string(),
            kind,
            key: key.to_string(),
            label,
            properties,
        };
        self.nodes.insert(node_key, node);
    }

    fn edge(&mut self, relation: Relation, source: NodeKey, target: NodeKey) {
        if source == target {
            return;
        }
        self.edges.insert(GraphEdge {
            relation,
            source: source.to_string(),
            target: target.to_string(),
        });
    }

    fn finish(self) -> KnowledgeGraph {
        KnowledgeGraph {
            nodes: self.nodes.into_values().collect(),
            edges: self.edges.into_iter().collect(),
        }
    }
}

fn load_turns(
    conn: &Connection,
    session: Option<&str>,
    since: Option<&str>,
    limit: usize,
) -> Result<Vec<Turn>> {
    let mut sql = format!("SELECT {} FROM turns t WHERE 1 = 1", Turn::COLUMNS);
    let limit = sql_limit(limit);
    let mut args: Vec<&dyn ToSql> = Vec::new();
    if let Some(session) = &session {
        args.push(session);
        sql.push_str(&format!(" AND t.session_id = ?{}", args.len()));
    }
    if let Some(since) = &since {
        args.push(since);
        sql.push_str(&format!(" AND t.timestamp >= ?{}", args.len()));
    }
    args.push(&limit);
    sql.push_str(&format!(" ORDER BY t.timestamp DESC, t.id LIMIT ?{}", args.len()));

    let mut stmt = conn.prepare(&sql)?;
    let turns = stmt
        .query_map(args.as_slice(), Turn::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(turns)
}

/// Upper bound on ids bound into one `IN (...)` list, well under SQLite's
/// host-parameter limit.
const IN_CHUNK: usize = 500;

/// Run `template` with its `{}` replaced by one placeholder per id, in chunks
/// of at most [`IN_CHUNK`] ids. Rows keep the order of the chunks.
fn query_in<T>(
    conn: &Connection,
    template: &str,
    ids: &[&str],
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    for chunk in ids.chunks(IN_CHUNK) {
        let placeholders: Vec<String> = (1..=chunk.len()).map(|i| format!("?{i}")).collect();
        let sql = template.replace("{}", &placeholders.join(", "));
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_map(rusqlite::params_from_iter(chunk), map)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.extend(found);
    }
    Ok(rows)
}
