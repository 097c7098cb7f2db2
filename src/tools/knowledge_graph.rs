//! MCP `knowledge_graph` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct KnowledgeGraphParams {
    #[schemars(description = "Only project turns at or after this date, YYYY-MM-DD or RFC 3339")]
    pub since: Option<String>,

    #[schemars(description = "Only project turns of this session")]
    pub session: Option<String>,

    #[schemars(description = "Maximum number of turns to project. Defaults to 200.")]
    pub limit: Option<usize>,

    /// If `true`, return node/edge counts without the graph itself.
    #[schemars(description = "If true, return only node and edge counts")]
    pub stats_only: Option<bool>,
}
