pub mod activate;
pub mod consolidate;
pub mod hybrid_search;
pub mod knowledge_graph;

use activate::ActivateParams;
use consolidate::ConsolidateParams;
use hybrid_search::HybridSearchParams;
use knowledge_graph::KnowledgeGraphParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::config::RecollectConfig;
use crate::memory::activation::{ActivationParams, ActivationSeed};
use crate::memory::consolidation::{ConsolidateOptions, FsContentStore};
use crate::memory::graph::GraphParams;
use crate::memory::redact::Redactor;
use crate::memory::search::{RepoHandle, SearchFilters, SearchMode, SearchRequest, SearchTarget};

/// The recollect MCP tool handler. Holds the shared record store connection
/// and config, and exposes one tool per retrieval engine.
#[derive(Clone)]
pub struct RecollectTools {
    tool_router: ToolRouter<Self>,
    db: Arc<Mutex<Connection>>,
    config: Arc<RecollectConfig>,
}

#[tool_router]
impl RecollectTools {
    pub fn new(db: Arc<Mutex<Connection>>, config: Arc<RecollectConfig>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            config,
        }
    }

    /// Find turns related to a seed turn through shared files and commits.
    #[tool(description = "Find past turns related to a seed turn (or every turn of a seed session) by spreading activation over shared touched files and shared commits. Returns turns with weight, hop distance and edge reason.")]
    async fn activate(
        &self,
        Parameters(params): Parameters<ActivateParams>,
    ) -> Result<String, String> {
        let seed = match (params.turn_id, params.seed_session) {
            (Some(turn), None) => ActivationSeed::Turn(turn),
            (None, Some(session)) => ActivationSeed::Session(session),
            _ => return Err("provide exactly one of 'turn_id' or 'seed_session'".into()),
        };
        let activation = ActivationParams {
            seed,
            session: params.session,
            max_hops: params.max_hops.unwrap_or(self.config.activation.max_hops),
            limit: params.limit.unwrap_or(self.config.activation.limit),
            decay: self.config.activation.decay,
            exclude: params
                .exclude
                .unwrap_or_default()
                .into_iter()
                .collect::<BTreeSet<_>>(),
        };

        tracing::info!(seed = ?activation.seed, max_hops = activation.max_hops, "activate called");

        let db = Arc::clone(&self.db);
        let results = tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            crate::memory::activation::activate(&conn, &activation).map_err(anyhow::Error::from)
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
        .map_err(|e| format!("activation failed: {e}"))?;

        serde_json::to_string(&results).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Keyword search fused with recency over turns or sessions.
    #[tool(description = "Search past turns or sessions. Keyword relevance is fused with recency by Reciprocal Rank Fusion unless keyword_only is set. Optional filters: file, commit, agent (turns only) and since.")]
    async fn hybrid_search(
        &self,
        Parameters(params): Parameters<HybridSearchParams>,
    ) -> Result<String, String> {
        let mode = SearchMode::from_flags(
            params.keyword_only.unwrap_or(false),
            params.hybrid.unwrap_or(false),
        )
        .map_err(|e| e.to_string())?;
        let target = match params.target.as_deref() {
            Some(t) => t.parse::<SearchTarget>().map_err(|e| e.to_string())?,
            None => SearchTarget::default(),
        };
        let request = SearchRequest {
            query: params.query,
            target,
            mode,
            filters: SearchFilters {
                file: params.file,
                commit: params.commit,
                agent: params.agent,
                since: params.since,
            },
            limit: params.limit.unwrap_or(self.config.search.default_limit),
        };
        let all_repos = params.all_repos.unwrap_or(false);

        tracing::info!(query = %request.query, ?mode, all_repos, "hybrid_search called");

        let db = Arc::clone(&self.db);
        let config = Arc::clone(&self.config);
        let response = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
            let redactor = Redactor::from_config(&config.redaction);
            if all_repos {
                let opened = crate::db::open_repositories(&config.repos);
                let handles: Vec<RepoHandle<'_>> = opened
                    .iter()
                    .map(|(name, conn)| RepoHandle { name, conn })
                    .collect();
                Ok(crate::memory::search::search_across(
                    &handles,
                    &request,
                    &config.search,
                    None,
                    redactor.as_ref(),
                )?)
            } else {
                let conn = db
                    .lock()
                    .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
                Ok(crate::memory::search::search(
                    &conn,
                    &request,
                    &config.search,
                    redactor.as_ref(),
                )?)
            }
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
        .map_err(|e| format!("search failed: {e}"))?;

        serde_json::to_string(&response).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Project sessions, turns, commits and files into a graph.
    #[tool(description = "Build a knowledge graph of sessions, turns, agents, commits, checkpoints and touched files. Set stats_only to get node and edge counts only.")]
    async fn knowledge_graph(
        &self,
        Parameters(params): Parameters<KnowledgeGraphParams>,
    ) -> Result<String, String> {
        let graph_params = GraphParams {
            since: params.since,
            session: params.session,
            turn_limit: params.limit.unwrap_or(self.config.graph.turn_limit),
        };
        let stats_only = params.stats_only.unwrap_or(false);

        tracing::info!(turn_limit = graph_params.turn_limit, stats_only, "knowledge_graph called");

        let db = Arc::clone(&self.db);
        let output = tokio::task::spawn_blocking(move || -> anyhow::Result<serde_json::Value> {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            let graph = crate::memory::graph::build_graph(&conn, &graph_params)?;
            let stats = crate::memory::graph::graph_stats(&graph);
            if stats_only {
                return Ok(serde_json::to_value(&stats)?);
            }
            Ok(serde_json::json!({
                "nodes": graph.nodes,
                "edges": graph.edges,
                "stats": stats,
            }))
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
        .map_err(|e| format!("graph failed: {e}"))?;

        Ok(output.to_string())
    }

    /// Preview or run content consolidation.
    #[tool(description = "Replace stored content of turns older than 'before' with compact summaries. Dry run unless execute=true.")]
    async fn consolidate(
        &self,
        Parameters(params): Parameters<ConsolidateParams>,
    ) -> Result<String, String> {
        let opts = ConsolidateOptions {
            before: params.before,
            session: params.session,
            limit: params.limit.unwrap_or(self.config.consolidation.batch_limit),
            execute: params.execute.unwrap_or(false),
            summary_chars: self.config.consolidation.summary_chars,
        };
        let content_root = self.config.resolved_content_root();

        tracing::info!(before = %opts.before, execute = opts.execute, "consolidate called");

        let db = Arc::clone(&self.db);
        let report = tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            crate::memory::consolidation::consolidate(
                &mut conn,
                &FsContentStore,
                &content_root,
                &opts,
            )
            .map_err(anyhow::Error::from)
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
        .map_err(|e| format!("consolidation failed: {e}"))?;

        tracing::info!(
            candidates = report.candidates,
            consolidated = report.consolidated(),
            failed = report.failed(),
            "consolidate finished"
        );

        serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
    }
}

#[tool_handler]
impl ServerHandler for RecollectTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "recollect retrieves context from past coding sessions. Use hybrid_search to \
                 find turns by keyword, activate to follow shared files and commits from a \
                 turn, and knowledge_graph for an overview."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
