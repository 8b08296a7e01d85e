//! sw_fetch tool implementation.
//!
//! Builds a request as a document would issue it and hands it to the proxy's
//! fetch handler.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{OfflineCacheProxy, ServedFrom, fetch::resolve};
use shellcache_core::{Error, Headers, Request, RequestMode, ResponseType};
use url::Url;

use super::json_result;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Accept header sent by the document.
    #[serde(default)]
    pub accept: Option<String>,

    /// Request mode: "navigate", "same-origin", "no-cors" or "cors" (default).
    #[serde(default)]
    pub mode: RequestMode,

    /// Id of the requesting document. Omit for a request the proxy always handles.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Request body, e.g. a submitted form. Such requests are never stored.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    /// "served", or "unresolved" when a navigation failed offline with nothing stored.
    pub outcome: String,
    pub source: Option<ServedFrom>,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub response_type: Option<ResponseType>,
    pub headers: Headers,
    /// Body decoded as UTF-8, lossy.
    pub body: Option<String>,
    pub body_bytes: usize,
}

pub async fn fetch_impl(
    proxy: &OfflineCacheProxy, origin: &Url, params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;

    let mut request = Request::get(url.clone())
        .with_method(&params.method)
        .with_mode(params.mode);
    if let Some(accept) = params.accept.as_deref() {
        request = request.with_header("accept", accept);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let served = proxy.handle_fetch(params.client_id.as_deref(), request).await?;

    let output = match served {
        Some(served) => SwFetchOutput {
            url: url.to_string(),
            outcome: "served".into(),
            source: Some(served.source),
            status: Some(served.response.status),
            status_text: Some(served.response.status_text.clone()),
            response_type: Some(served.response.response_type),
            body: Some(String::from_utf8_lossy(&served.response.body).into_owned()),
            body_bytes: served.response.body.len(),
            headers: served.response.headers,
        },
        None => SwFetchOutput {
            url: url.to_string(),
            outcome: "unresolved".into(),
            source: None,
            status: None,
            status_text: None,
            response_type: None,
            headers: Headers::new(),
            body: None,
            body_bytes: 0,
        },
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{origin, output, proxy, shell_stub};
    use rmcp::model::ErrorCode;
    use shellcache_client::ClientRegistry;
    use shellcache_core::{CacheStorage, Response};

    fn params(url: &str) -> SwFetchParams {
        SwFetchParams {
            url: url.into(),
            method: default_method(),
            accept: None,
            mode: RequestMode::Cors,
            client_id: None,
            body: None,
        }
    }

    async fn activated(fetcher: std::sync::Arc<shellcache_client::fetch::StubFetcher>, storage: &CacheStorage)
    -> std::sync::Arc<OfflineCacheProxy> {
        let proxy = proxy("workout-pro-v5", storage, fetcher, &ClientRegistry::new());
        proxy.install().await.unwrap();
        proxy.activate().await.unwrap();
        proxy
    }

    #[tokio::test]
    async fn test_offline_navigation_served_from_store() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = shell_stub();
        let proxy = activated(fetcher.clone(), &storage).await;

        fetcher.set_offline(true);
        let p = SwFetchParams { mode: RequestMode::Navigate, ..params("/index.html") };
        let out = output(&fetch_impl(&proxy, &origin(), p).await.unwrap());

        assert_eq!(out["outcome"], "served");
        assert_eq!(out["source"], "cache");
        assert_eq!(out["status"], 200);
        assert_eq!(out["body"], "<html>index</html>");
    }

    #[tokio::test]
    async fn test_offline_navigation_unresolved() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = shell_stub();
        let proxy = activated(fetcher.clone(), &storage).await;

        fetcher.set_offline(true);
        let p = SwFetchParams { accept: Some("text/html".into()), ..params("/never-seen") };
        let out = output(&fetch_impl(&proxy, &origin(), p).await.unwrap());

        assert_eq!(out["outcome"], "unresolved");
        assert!(out["source"].is_null());
    }

    #[tokio::test]
    async fn test_generic_miss_goes_to_network() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = shell_stub();
        fetcher.respond("http://localhost:8080/app.js", Response::new(200, "console.log(1)"));
        let proxy = activated(fetcher.clone(), &storage).await;

        let out = output(&fetch_impl(&proxy, &origin(), params("app.js")).await.unwrap());
        assert_eq!(out["url"], "http://localhost:8080/app.js");
        assert_eq!(out["source"], "network");
        assert_eq!(out["response_type"], "basic");
        assert_eq!(out["body_bytes"], 14);

        proxy.flush_writes().await;
        fetcher.set_offline(true);
        let out = output(&fetch_impl(&proxy, &origin(), params("app.js")).await.unwrap());
        assert_eq!(out["source"], "cache");
    }

    #[tokio::test]
    async fn test_generic_offline_is_network_error() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = shell_stub();
        let proxy = activated(fetcher.clone(), &storage).await;
        fetcher.set_offline(true);

        let err = fetch_impl(&proxy, &origin(), params("/app.js")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32021));
    }

    #[tokio::test]
    async fn test_redundant_version_passes_through() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = shell_stub();
        fetcher.fail("http://localhost:8080/index.html", "connection refused");
        fetcher.respond("http://localhost:8080/app.js", Response::new(200, "js"));
        let proxy = proxy("workout-pro-v7", &storage, fetcher, &ClientRegistry::new());
        assert!(proxy.install().await.is_err());
        storage.delete("workout-pro-v7").await.unwrap();

        let out = output(&fetch_impl(&proxy, &origin(), params("/app.js")).await.unwrap());
        assert_eq!(out["source"], "network");

        proxy.flush_writes().await;
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_form_post_is_not_stored() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = shell_stub();
        fetcher.respond("http://localhost:8080/log", Response::new(200, "<html>saved</html>"));
        let proxy = activated(fetcher, &storage).await;

        let p = SwFetchParams {
            method: "POST".into(),
            mode: RequestMode::Navigate,
            body: Some("reps=12".into()),
            ..params("/log")
        };
        let out = output(&fetch_impl(&proxy, &origin(), p).await.unwrap());
        assert_eq!(out["body"], "<html>saved</html>");

        proxy.flush_writes().await;
        let entries = storage.store("workout-pro-v5").keys().await.unwrap();
        assert!(entries.iter().all(|e| e.method == "GET"));
    }

    #[tokio::test]
    async fn test_bad_url() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let proxy = proxy("workout-pro-v5", &storage, shell_stub(), &ClientRegistry::new());

        let err = fetch_impl(&proxy, &origin(), params("ftp://example.com/x")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32003));
    }
}
