//! CLI `agents` and `lineage` commands: parent-pointer hierarchies.

use anyhow::Result;
use clap::Subcommand;

use crate::config::RecollectConfig;
use crate::memory::lineage;

#[derive(Debug, Subcommand)]
pub enum AgentsAction {
    /// Agent ancestry of a session, leaf to root
    Chain {
        session: String,
        #[arg(long)]
        json: bool,
    },
    /// Agents spawned below a root agent
    Tree {
        agent: String,
        #[arg(long, default_value_t = 3)]
        depth: usize,
        #[arg(long)]
        json: bool,
    },
}

pub fn agents(config: &RecollectConfig, action: AgentsAction) -> Result<()> {
    let conn = super::open_store(config)?;

    match action {
        AgentsAction::Chain { session, json } => {
            let chain = lineage::agent_chain(&conn, &session)?;
            if json {
                return super::print_json(&chain);
            }
            if chain.is_empty() {
                println!("Session {session} has no agent.");
            }
            for (i, agent) in chain.iter().enumerate() {
                println!(
                    "{}{} [{}] {}",
                    "  ".repeat(i),
                    agent.id,
                    agent.agent_type,
                    agent.name.as_deref().unwrap_or(""),
                );
            }
        }
        AgentsAction::Tree { agent, depth, json } => {
            let tree = lineage::agent_tree(&conn, &agent, depth)?;
            if json {
                return super::print_json(&tree);
            }
            for node in &tree.nodes {
                println!(
                    "{}{} [{}] sessions: {}",
                    "  ".repeat(node.depth),
                    node.agent.id,
                    node.agent.role.as_deref().unwrap_or(&node.agent.agent_type),
                    node.session_count,
                );
            }
        }
    }
    Ok(())
}

/// Print a checkpoint followed by its ancestors.
pub fn checkpoint_lineage(config: &RecollectConfig, checkpoint: &str, json: bool) -> Result<()> {
    let conn = super::open_store(config)?;
    let chain = lineage::checkpoint_lineage(&conn, checkpoint)?;
    if json {
        return super::print_json(&chain);
    }
    for cp in &chain {
        println!(
            "  {} {} {} {}",
            super::short_id(&cp.id),
            super::short_id(&cp.git_commit_hash),
            cp.git_branch.as_deref().unwrap_or("-"),
            cp.created_at,
        );
    }
    Ok(())
}
