//! Parent-pointer traversals: agent hierarchy and checkpoint chains.
//!
//! Storage does not guarantee acyclicity, so every walk carries a visited set
//! and stops (with a warning) when it comes back to a node it has seen.

use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

use crate::error::{RecallError, Result};
use crate::memory::store;
use crate::memory::types::{Agent, Checkpoint};

#[derive(Debug, Clone, Serialize)]
pub struct AgentNode {
    #[serde(flatten)]
    pub agent: Agent,
    pub depth: usize,
    pub session_count: i64,
}

/// Parent → child spawn edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnEdge {
    pub source: String,
    pub target: String,
    pub relation: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentTree {
    pub nodes: Vec<AgentNode>,
    pub edges: Vec<SpawnEdge>,
}

/// The agent ancestry of a session, from its own agent up to the root.
///
/// A session without an agent yields an empty chain; an unknown session is
/// [`RecallError::NotFound`].
pub fn agent_chain(conn: &Connection, session_id: &str) -> Result<Vec<Agent>> {
    let session = store::get_session(conn, session_id)?
        .ok_or_else(|| RecallError::not_found("session", session_id))?;

    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut current = session.agent_id;

    while let Some(id) = current {
        if !visited.insert(id.clone()) {
            tracing::warn!(agent = %id, session = session_id, "agent hierarchy cycle, stopping");
            break;
        }
        let Some(agent) = store::get_agent(conn, &id)? else {
            break;
        };
        current = agent.parent_agent_id.clone();
        chain.push(agent);
    }
    Ok(chain)
}

/// Breadth-first walk downward from `root_id`, at most `depth` levels below
/// the root. Each node carries the number of sessions it ran.
pub fn agent_tree(conn: &Connection, root_id: &str, depth: usize) -> Result<AgentTree> {
    let root = store::get_agent(conn, root_id)?
        .ok_or_else(|| RecallError::not_found("agent", root_id))?;

    let mut children_stmt = conn.prepare(&format!(
        "SELECT {} FROM agents a WHERE a.parent_agent_id = ?1 ORDER BY a.id",
        Agent::COLUMNS
    ))?;
    let mut count_stmt = conn.prepare("SELECT COUNT(*) FROM sessions WHERE agent_id = ?1")?;

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut visited: HashSet<String> = HashSet::from([root.id.clone()]);
    let mut queue: VecDeque<(Agent, usize)> = VecDeque::from([(root, 0)]);

    while let Some((agent, level)) = queue.pop_front() {
        if level < depth {
            let children = children_stmt
                .query_map(params![agent.id], Agent::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for child in children {
                if !visited.insert(child.id.clone()) {
                    tracing::warn!(agent = %child.id, "agent hierarchy cycle, skipping");
                    continue;
                }
                edges.push(SpawnEdge {
                    source: agent.id.clone(),
                    target: child.id.clone(),
                    relation: "spawned",
                });
                queue.push_back((child, level + 1));
            }
        }
        let session_count: i64 = count_stmt.query_row(params![agent.id], |row| row.get(0))?;
        nodes.push(AgentNode {
            agent,
            depth: level,
            session_count,
        });
    }

    tracing::debug!(root = root_id, nodes = nodes.len(), "agent tree built");
    Ok(AgentTree { nodes, edges })
}

/// A checkpoint followed by its ancestors, newest first.
pub fn checkpoint_lineage(conn: &Connection, checkpoint_id: &str) -> Result<Vec<Checkpoint>> {
    let first = store::get_checkpoint(conn, checkpoint_id)?
        .ok_or_else(|| RecallError::not_found("checkpoint", checkpoint_id))?;

    let mut visited = HashSet::from([first.id.clone()]);
    let mut next = first.parent_checkpoint_id.clone();
    let mut lineage = vec![first];

    while let Some(id) = next {
        if !visited.insert(id.clone()) {
            tracing::warn!(checkpoint = %id, "checkpoint chain cycle, stopping");
            break;
        }
        let Some(checkpoint) = store::get_checkpoint(conn, &id)? else {
            break;
        };
        next = checkpoint.parent_checkpoint_id.clone();
        lineage.push(checkpoint);
    }
    Ok(lineage)
}
