//! MCP `activate` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `activate` MCP tool.
///
/// Provide exactly one seed: `turn_id` or `seed_session`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ActivateParams {
    /// Seed turn id or a unique prefix of one.
    #[schemars(description = "Seed turn id (or unique prefix). Required unless 'seed_session' is provided.")]
    pub turn_id: Option<String>,

    /// Seed from every turn of a session.
    #[schemars(description = "Seed from every turn of this session. Required unless 'turn_id' is provided.")]
    pub seed_session: Option<String>,

    #[schemars(description = "Only reach turns in this session")]
    pub session: Option<String>,

    #[schemars(description = "Maximum hops from the seed. Defaults to 2.")]
    pub max_hops: Option<usize>,

    #[schemars(description = "Maximum number of results. Defaults to 20.")]
    pub limit: Option<usize>,

    #[schemars(description = "Turn ids that must never be reached or traversed through")]
    pub exclude: Option<Vec<String>>,
}
