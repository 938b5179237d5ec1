//! MCP tool implementations.
//!
//! This module contains all tools exposed by the sparkcache server.

pub mod cache;
pub mod lifecycle;
pub mod sw_fetch;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use sparkcache_core::Error;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use rmcp::model::CallToolResult;
    use sparkcache_client::{CachingProxy, FetchConfig, HttpFetcher, ProxyConfig};
    use sparkcache_core::{AppConfig, CacheDb};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const MANIFEST: [&str; 3] = ["/", "/index.html", "/styles.css"];

    /// Origin serving every manifest path with its own path as the body.
    pub(crate) async fn site() -> MockServer {
        let server = MockServer::start().await;
        for route in MANIFEST {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_string(route))
                .mount(&server)
                .await;
        }
        server
    }

    pub(crate) async fn proxy_for(origin: &MockServer, skip_waiting: bool) -> (Arc<CachingProxy>, CacheDb) {
        let config = AppConfig {
            origin: origin.uri(),
            static_cache: "spark-v2".into(),
            runtime_cache: "spark-runtime-v2".into(),
            manifest: MANIFEST.iter().map(|p| p.to_string()).collect(),
            timeout_ms: 1_000,
            skip_waiting,
            ..AppConfig::default()
        };
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = HttpFetcher::new(FetchConfig::from_app_config(&config)).unwrap();
        let proxy = CachingProxy::new(
            ProxyConfig::from_app_config(&config).unwrap(),
            Arc::new(db.clone()),
            Arc::new(fetcher),
        )
        .unwrap();
        (Arc::new(proxy), db)
    }

    /// Parse the JSON text of a tool result.
    pub(crate) fn output_json(result: &CallToolResult) -> serde_json::Value {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
