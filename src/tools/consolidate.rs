//! MCP `consolidate` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `consolidate` MCP tool.
///
/// Nothing is modified unless `execute` is `true`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidateParams {
    #[schemars(description = "Consolidate turns strictly older than this date, YYYY-MM-DD or RFC 3339")]
    pub before: String,

    #[schemars(description = "Only consolidate turns of this session")]
    pub session: Option<String>,

    #[schemars(description = "Maximum number of turns to process. Defaults to 500.")]
    pub limit: Option<usize>,

    #[schemars(description = "Apply changes. When false or omitted, only report eligible turns.")]
    pub execute: Option<bool>,
}
