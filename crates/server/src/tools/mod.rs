//! MCP tool implementations.
//!
//! Each tool drives one lifecycle event or inspects the store on behalf of
//! the host. Outputs are pretty-printed JSON text content.

pub mod cache;
pub mod clients;
pub mod fetch;
pub mod lifecycle;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

pub use clients::{ClientConnectParams, ClientDisconnectParams, ClientMessagesParams};
pub use fetch::SwFetchParams;

fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::Serialize(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use rmcp::model::CallToolResult;
    use shellcache_client::fetch::StubFetcher;
    use shellcache_client::{CacheVersion, ClientRegistry, Manifest, OfflineCacheProxy};
    use shellcache_core::{CacheStorage, Response};
    use url::Url;

    pub const ORIGIN: &str = "http://localhost:8080";

    pub fn origin() -> Url {
        Url::parse(ORIGIN).unwrap()
    }

    pub fn shell_stub() -> Arc<StubFetcher> {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher
            .respond("http://localhost:8080/", Response::new(200, "<html>root</html>"))
            .respond("http://localhost:8080/index.html", Response::new(200, "<html>index</html>"));
        fetcher
    }

    pub fn proxy(
        version: &str, storage: &CacheStorage, fetcher: Arc<StubFetcher>, clients: &ClientRegistry,
    ) -> Arc<OfflineCacheProxy> {
        let manifest = Manifest::resolve(&origin(), &["/", "/index.html"]).unwrap();
        Arc::new(OfflineCacheProxy::new(
            CacheVersion::new(version),
            manifest,
            storage.clone(),
            fetcher,
            clients.clone(),
        ))
    }

    /// Parse the JSON text content of a tool result.
    pub fn output(result: &CallToolResult) -> serde_json::Value {
        let content = serde_json::to_value(&result.content[0]).unwrap();
        let text = content
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
