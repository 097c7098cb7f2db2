//! CLI `graph` command: knowledge graph snapshot or its statistics.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::config::RecollectConfig;
use crate::memory::graph::{self, GraphParams, GraphStats, KnowledgeGraph};

#[derive(Debug, Args)]
pub struct GraphArgs {
    /// Only turns at or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub since: Option<String>,

    #[arg(long)]
    pub session: Option<String>,

    /// Maximum turns to project
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print counts only
    #[arg(long)]
    pub stats: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct GraphOutput<'a> {
    #[serde(flatten)]
    graph: &'a KnowledgeGraph,
    stats: &'a GraphStats,
}

pub fn graph(config: &RecollectConfig, args: GraphArgs) -> Result<()> {
    let conn = super::open_store(config)?;
    let params = GraphParams {
        since: args.since,
        session: args.session,
        turn_limit: args.limit.unwrap_or(config.graph.turn_limit),
    };

    let graph = graph::build_graph(&conn, &params)?;
    let stats = graph::graph_stats(&graph);

    if args.json {
        return if args.stats {
            super::print_json(&stats)
        } else {
            super::print_json(&GraphOutput {
                graph: &graph,
                stats: &stats,
            })
        };
    }

    println!("Knowledge Graph");
    println!("{}", "=".repeat(40));
    println!("  Nodes: {}", stats.total_nodes);
    for (kind, count) in &stats.nodes_by_kind {
        println!("    {:<12} {}", kind.as_str(), count);
    }
    println!("  Edges: {}", stats.total_edges);
    for (relation, count) in &stats.edges_by_relation {
        println!("    {:<15} {}", relation.as_str(), count);
    }

    if !args.stats && !graph.edges.is_empty() {
        println!();
        for edge in &graph.edges {
            println!("  {} --[{}]--> {}", edge.source, edge.relation.as_str(), edge.target);
        }
    }
    Ok(())
}
