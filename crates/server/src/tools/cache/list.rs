//! cache_list tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sparkcache_client::ProxyConfig;
use sparkcache_core::{ActiveVersion, CacheDb, GenerationInfo};

use crate::tools::json_result;

/// One stored generation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationListing {
    #[serde(flatten)]
    pub info: GenerationInfo,
    /// Whether the running version owns this generation.
    pub current: bool,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub generations: Vec<GenerationListing>,
    /// Version that last activated against this store.
    pub active: Option<ActiveVersion>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(cache: &CacheDb, config: &ProxyConfig) -> Result<CallToolResult, McpError> {
    let current = config.current_generations();
    let generations = cache
        .list_generations()
        .await?
        .into_iter()
        .map(|info| GenerationListing { current: current.contains(&info.name.as_str()), info })
        .collect();
    let active = cache.active_version().await?;

    json_result(&CacheListOutput { generations, active })
}
