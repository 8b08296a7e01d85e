//! cache_match tool implementation.
//!
//! Looks a GET request up in the stores without touching the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{OfflineCacheProxy, fetch::resolve};
use shellcache_core::{Error, Headers, Request, ResponseType};
use url::Url;

use crate::tools::json_result;

/// Parameters for the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// Store to search (default: the current version's store).
    #[serde(default)]
    pub store: Option<String>,

    /// Search every store, oldest first. Overrides `store`.
    #[serde(default)]
    pub all_stores: bool,
}

/// Output from the cache_match tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMatchOutput {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub headers: Headers,
    pub body: String,
    pub body_bytes: usize,
}

pub async fn match_impl(
    proxy: &OfflineCacheProxy, origin: &Url, params: CacheMatchParams,
) -> Result<CallToolResult, McpError> {
    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;
    let request = Request::get(url.clone());
    let storage = proxy.storage();

    let hit = if params.all_stores {
        storage.match_any(&request).await?
    } else {
        let name = params.store.as_deref().unwrap_or(proxy.version().as_str());
        storage.store(name).match_request(&request).await?
    };

    let response = hit.ok_or_else(|| Error::CacheMiss(url.to_string()))?;

    json_result(&CacheMatchOutput {
        url: url.to_string(),
        status: response.status,
        status_text: response.status_text.clone(),
        response_type: response.response_type,
        body: String::from_utf8_lossy(&response.body).into_owned(),
        body_bytes: response.body.len(),
        headers: response.headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{origin, output, proxy, shell_stub};
    use rmcp::model::ErrorCode;
    use shellcache_client::ClientRegistry;
    use shellcache_core::{CacheStorage, Response};

    fn params(url: &str) -> CacheMatchParams {
        CacheMatchParams { url: url.into(), store: None, all_stores: false }
    }

    #[tokio::test]
    async fn test_match_current_store() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let proxy = proxy("workout-pro-v5", &storage, shell_stub(), &ClientRegistry::new());
        proxy.install().await.unwrap();

        let out = output(&match_impl(&proxy, &origin(), params("/index.html")).await.unwrap());
        assert_eq!(out["status"], 200);
        assert_eq!(out["body"], "<html>index</html>");
    }

    #[tokio::test]
    async fn test_match_named_and_all_stores() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let old = storage.open_store("workout-pro-v4").await.unwrap();
        old.put(
            &Request::get(Url::parse("http://localhost:8080/legacy.js").unwrap()),
            &Response::new(200, "old"),
        )
        .await
        .unwrap();
        let proxy = proxy("workout-pro-v5", &storage, shell_stub(), &ClientRegistry::new());

        let err = match_impl(&proxy, &origin(), params("/legacy.js")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32001));

        let named = CacheMatchParams { store: Some("workout-pro-v4".into()), ..params("/legacy.js") };
        assert_eq!(output(&match_impl(&proxy, &origin(), named).await.unwrap())["body"], "old");

        let all = CacheMatchParams { all_stores: true, ..params("/legacy.js") };
        assert_eq!(output(&match_impl(&proxy, &origin(), all).await.unwrap())["body"], "old");
    }
}
