//! CLI `search` command: hybrid keyword + recency search.

use anyhow::Result;
use clap::Args;

use crate::config::RecollectConfig;
use crate::memory::redact::Redactor;
use crate::memory::search::{
    self, RepoHandle, SearchFilters, SearchHit, SearchMode, SearchRequest, SearchResponse,
    SearchTarget,
};

#[derive(Debug, Args)]
pub struct SearchArgs {
    pub query: String,

    /// turn or session
    #[arg(long, default_value = "turn")]
    pub target: SearchTarget,

    /// Substring of a touched file path (turns only)
    #[arg(long)]
    pub file: Option<String>,

    /// Exact commit hash (turns only)
    #[arg(long)]
    pub commit: Option<String>,

    /// Session type of the owning session (turns only)
    #[arg(long)]
    pub agent: Option<String>,

    /// Inclusive lower date bound (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub since: Option<String>,

    #[arg(long)]
    pub limit: Option<usize>,

    /// Keyword relevance only
    #[arg(long)]
    pub fts: bool,

    /// Keyword relevance fused with recency (default)
    #[arg(long)]
    pub hybrid: bool,

    /// Search every repository listed under [[repos]] in the config
    #[arg(long)]
    pub all_repos: bool,

    #[arg(long)]
    pub json: bool,
}

pub fn search(config: &RecollectConfig, args: SearchArgs) -> Result<()> {
    // Mode conflicts are rejected before anything is opened
    let mode = SearchMode::from_flags(args.fts, args.hybrid)?;
    let request = SearchRequest {
        query: args.query,
        target: args.target,
        mode,
        filters: SearchFilters {
            file: args.file,
            commit: args.commit,
            agent: args.agent,
            since: args.since,
        },
        limit: args.limit.unwrap_or(config.search.default_limit),
    };
    let redactor = Redactor::from_config(&config.redaction);

    let response = if args.all_repos {
        let opened = crate::db::open_repositories(&config.repos);
        let handles: Vec<RepoHandle<'_>> = opened
            .iter()
            .map(|(name, conn)| RepoHandle { name, conn })
            .collect();
        search::search_across(&handles, &request, &config.search, None, redactor.as_ref())?
    } else {
        let conn = super::open_store(config)?;
        search::search(&conn, &request, &config.search, redactor.as_ref())?
    };

    if args.json {
        return super::print_json(&response);
    }
    print_table(&response);
    Ok(())
}

fn print_table(response: &SearchResponse) {
    if let Some(reason) = &response.degraded_reason {
        println!("(degraded: {reason})");
    }
    if response.results.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, r) in response.results.iter().enumerate() {
        let repo = r.repo.as_deref().map(|n| format!("{n}/")).unwrap_or_default();
        let (when, text) = match &r.hit {
            SearchHit::Turn {
                timestamp,
                user_message,
                assistant_summary,
                ..
            } => (
                timestamp.as_str(),
                user_message.as_deref().or(assistant_summary.as_deref()),
            ),
            SearchHit::Session {
                last_activity_at,
                title,
                summary,
                ..
            } => (last_activity_at.as_str(), title.as_deref().or(summary.as_deref())),
        };
        println!(
            "  {}. {}{} (score: {:.4}, {})",
            i + 1,
            repo,
            super::short_id(&r.id),
            r.score,
            when,
        );
        println!("     {}", super::preview(text, 100));
    }
}
