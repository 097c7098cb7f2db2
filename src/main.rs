mod cli;
mod config;
mod db;
mod error;
mod memory;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recollect", version, about = "Retrieve context from past AI coding sessions")]
struct Cli {
    /// Config file (defaults to ~/.recollect/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Related turns by spreading activation from a seed
    Activate(cli::activate::ActivateArgs),
    /// Keyword search fused with recency
    Search(cli::search::SearchArgs),
    /// Knowledge graph of sessions, turns, commits and files
    Graph(cli::graph::GraphArgs),
    /// Replace old turn content with compact summaries
    Consolidate(cli::consolidate::ConsolidateArgs),
    /// Inspect the agent hierarchy
    Agents {
        #[command(subcommand)]
        action: cli::agents::AgentsAction,
    },
    /// Show a checkpoint and its ancestors
    Lineage {
        checkpoint: String,
        #[arg(long)]
        json: bool,
    },
    /// Show record store statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::RecollectConfig::load_from(path)?,
        None => config::RecollectConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve_stdio(config).await?,
        Command::Activate(args) => cli::activate::activate(&config, args)?,
        Command::Search(args) => cli::search::search(&config, args)?,
        Command::Graph(args) => cli::graph::graph(&config, args)?,
        Command::Consolidate(args) => cli::consolidate::consolidate(&config, args)?,
        Command::Agents { action } => cli::agents::agents(&config, action)?,
        Command::Lineage { checkpoint, json } => {
            cli::agents::checkpoint_lineage(&config, &checkpoint, json)?
        }
        Command::Stats { json } => cli::stats::stats(&config, json)?,
    }

    Ok(())
}
