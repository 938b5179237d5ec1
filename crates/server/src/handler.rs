//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    cache::{CacheDeleteParams, delete_impl, list_impl},
    lifecycle::{SwMessageParams, activate_impl, install_impl, message_impl},
    sw_fetch::{SwFetchParams, fetch_impl},
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use sparkcache_client::CachingProxy;
use sparkcache_core::CacheDb;

/// The main MCP server handler for sparkcache.
#[derive(Clone)]
pub struct SparkCacheServer {
    proxy: Arc<CachingProxy>,
    cache: CacheDb,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SparkCacheServer {
    /// Create a new server handler over a proxy and the store it writes to.
    pub fn new(proxy: Arc<CachingProxy>, cache: CacheDb) -> Self {
        Self { proxy, cache, tool_router: Self::tool_router() }
    }

    #[tool(description = "Run the install step: preload every manifest asset into the static cache generation.")]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.proxy).await
    }

    #[tool(description = "Run the activate step: delete superseded cache generations and start serving from cache.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.proxy).await
    }

    #[tool(description = "Send a message to the proxy. {\"type\": \"SKIP_WAITING\"} activates an installed version.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.proxy, params.0).await
    }

    /// Route a request through the caching proxy.
    ///
    /// Navigations and same-origin assets are cache-first, allow-listed external
    /// assets are stale-while-revalidate, everything else goes to the network.
    #[tool(
        description = "Fetch a URL through the offline-first cache. Returns status, body, and whether it came from cache or network."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.proxy, params.0).await
    }

    #[tool(description = "List cache generations with entry counts.")]
    async fn cache_list(&self) -> Result<CallToolResult, McpError> {
        list_impl(&self.cache, self.proxy.config()).await
    }

    #[tool(description = "Delete a cache generation and all of its entries.")]
    async fn cache_delete(&self, params: Parameters<CacheDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(&self.cache, params.0).await
    }
}

impl ServerHandler for SparkCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sparkcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
