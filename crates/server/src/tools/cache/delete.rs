//! cache_delete tool implementation.
//!
//! Deletes one generation and every entry in it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sparkcache_core::{CacheDb, Error};

use crate::tools::json_result;

/// Parameters for the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// Generation name.
    pub name: String,
}

/// Output from the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteOutput {
    pub name: String,
    /// False if no such generation existed.
    pub deleted: bool,
}

/// Implementation of the cache_delete tool.
pub async fn delete_impl(cache: &CacheDb, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    let name = params.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".to_string()).into());
    }

    let deleted = cache.delete_generation(name).await?;
    tracing::info!(generation = name, deleted, "cache_delete");

    json_result(&CacheDeleteOutput { name: name.to_string(), deleted })
}
