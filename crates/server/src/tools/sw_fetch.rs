//! sw_fetch tool implementation.
//!
//! Routes a request through the caching proxy and reports where the response
//! came from.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sparkcache_client::{CachingProxy, Method, Request, RequestMode, ResponseSource, RoutingClass};
use sparkcache_core::Error;

use super::json_result;

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the site origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Treat the request as a top-level page navigation.
    #[serde(default)]
    pub navigate: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwFetchOutput {
    /// The canonical URL requested.
    pub url: String,
    /// The final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Where the response came from.
    pub source: ResponseSource,
    /// How the request was routed.
    pub class: RoutingClass,
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Body size in bytes.
    pub bytes: usize,
    /// Body as text, lossily decoded.
    pub body: String,
    /// Network time in milliseconds (0 when served from cache).
    pub fetch_ms: u64,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(proxy: &CachingProxy, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("invalid method: {}", params.method)))?;

    let mut request = Request::new(method, &params.url, Some(&proxy.config().origin)).map_err(Error::from)?;
    if params.navigate {
        request = request.with_mode(RequestMode::Navigate);
    }

    let result = proxy.on_fetch(request).await?;
    let response = result.response;

    let output = SwFetchOutput {
        url: response.url.to_string(),
        final_url: response.final_url.to_string(),
        status: response.status.as_u16(),
        source: result.source,
        class: result.class,
        content_type: response.content_type,
        bytes: response.bytes.len(),
        body: String::from_utf8_lossy(&response.bytes).into_owned(),
        fetch_ms: response.fetch_ms,
    };

    json_result(&output)
}
