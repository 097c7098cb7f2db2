//! MCP `hybrid_search` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `hybrid_search` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HybridSearchParams {
    #[schemars(description = "Keyword query matched against turn messages or session titles")]
    pub query: String,

    /// `"turn"` (default) or `"session"`.
    #[schemars(description = "What to search: 'turn' (default) or 'session'")]
    pub target: Option<String>,

    #[schemars(description = "Substring of a touched file path (turn target only)")]
    pub file: Option<String>,

    #[schemars(description = "Exact git commit hash (turn target only)")]
    pub commit: Option<String>,

    #[schemars(description = "Session type of the owning session (turn target only)")]
    pub agent: Option<String>,

    #[schemars(description = "Inclusive lower date bound, YYYY-MM-DD or RFC 3339")]
    pub since: Option<String>,

    #[schemars(description = "Maximum number of results. Defaults to 20.")]
    pub limit: Option<usize>,

    /// Keyword relevance only. Conflicts with `hybrid`.
    #[schemars(description = "Rank by keyword relevance only. Cannot be combined with 'hybrid'.")]
    pub keyword_only: Option<bool>,

    #[schemars(description = "Fuse keyword relevance with recency (the default). Cannot be combined with 'keyword_only'.")]
    pub hybrid: Option<bool>,

    #[schemars(description = "Search every configured repository instead of the local store")]
    pub all_repos: Option<bool>,
}
