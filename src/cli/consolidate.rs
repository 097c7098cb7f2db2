//! CLI `consolidate` command: preview or run content consolidation.

use anyhow::Result;
use clap::Args;

use crate::config::RecollectConfig;
use crate::memory::consolidation::{self, ConsolidateOptions, FsContentStore, TurnOutcome};

#[derive(Debug, Args)]
pub struct ConsolidateArgs {
    /// Consolidate turns strictly older than this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub before: String,

    #[arg(long)]
    pub session: Option<String>,

    #[arg(long)]
    pub limit: Option<usize>,

    /// Apply changes. Without this flag nothing is modified.
    #[arg(long)]
    pub execute: bool,

    #[arg(long)]
    pub json: bool,
}

pub fn consolidate(config: &RecollectConfig, args: ConsolidateArgs) -> Result<()> {
    let mut conn = super::open_store(config)?;
    let content_root = config.resolved_content_root();
    let opts = ConsolidateOptions {
        before: args.before,
        session: args.session,
        limit: args.limit.unwrap_or(config.consolidation.batch_limit),
        execute: args.execute,
        summary_chars: config.consolidation.summary_chars,
    };

    let report = consolidation::consolidate(&mut conn, &FsContentStore, &content_root, &opts)?;

    if args.json {
        return super::print_json(&report);
    }

    if !report.execute {
        println!(
            "Dry run: {} turn(s) eligible before {}. Re-run with --execute to apply.",
            report.candidates, opts.before
        );
    }
    for record in &report.records {
        let status = match &record.outcome {
            TurnOutcome::Eligible => "eligible".to_string(),
            TurnOutcome::Consolidated => "consolidated".to_string(),
            TurnOutcome::Skipped { reason } => format!("skipped: {reason}"),
            TurnOutcome::Failed { error } => format!("failed: {error}"),
        };
        println!("  {:<14} {}", super::short_id(&record.turn_id), status);
    }
    if report.execute {
        println!(
            "Consolidated {}, skipped {}, failed {} (of {} candidates).",
            report.consolidated(),
            report.skipped(),
            report.failed(),
            report.candidates
        );
    }
    Ok(())
}
