//! CLI `activate` command: related turns by spreading activation.

use anyhow::Result;
use clap::Args;
use std::collections::BTreeSet;

use crate::config::RecollectConfig;
use crate::memory::activation::{self, ActivationParams, ActivationSeed};

#[derive(Debug, Args)]
pub struct ActivateArgs {
    /// Seed turn id (or unique prefix)
    #[arg(required_unless_present = "from_session", conflicts_with = "from_session")]
    pub turn: Option<String>,

    /// Seed from every turn of this session instead of a single turn
    #[arg(long)]
    pub from_session: Option<String>,

    /// Only reach turns in this session
    #[arg(long)]
    pub session: Option<String>,

    /// Maximum hops from the seed
    #[arg(long)]
    pub hops: Option<usize>,

    /// Maximum results
    #[arg(long)]
    pub limit: Option<usize>,

    /// Turn ids to exclude (repeatable)
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn activate(config: &RecollectConfig, args: ActivateArgs) -> Result<()> {
    let conn = super::open_store(config)?;

    let seed = match (args.turn, args.from_session) {
        (Some(turn), _) => ActivationSeed::Turn(turn),
        (None, Some(session)) => ActivationSeed::Session(session),
        (None, None) => anyhow::bail!("a seed turn or --from-session is required"),
    };
    let params = ActivationParams {
        seed,
        session: args.session,
        max_hops: args.hops.unwrap_or(config.activation.max_hops),
        limit: args.limit.unwrap_or(config.activation.limit),
        decay: config.activation.decay,
        exclude: args.exclude.into_iter().collect::<BTreeSet<_>>(),
    };

    let results = activation::activate(&conn, &params)?;

    if args.json {
        return super::print_json(&results);
    }
    if results.is_empty() {
        println!("No related turns found.");
        return Ok(());
    }

    println!("{:<14} {:>7} {:>4}  {:<14} PREVIEW", "TURN", "WEIGHT", "HOP", "REASON");
    for r in &results {
        println!(
            "{:<14} {:>7.4} {:>4}  {:<14} {}",
            super::short_id(&r.turn_id),
            r.weight,
            r.hop,
            r.reason.as_str(),
            super::preview(r.preview.as_deref(), 60),
        );
    }
    Ok(())
}
