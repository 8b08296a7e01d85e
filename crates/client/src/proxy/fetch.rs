//! Fetch dispatch: classify the request and serve it network-first or cache-first.
//!
//! Every response that is both returned and stored is cloned before either
//! side reads it; the store gets the clone through a detached write.

use serde::Serialize;
use shellcache_core::{Error, Request, RequestMode, Response, ResponseType};

use super::{OfflineCacheProxy, WorkerState};

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServedFrom {
    Network,
    Cache,
}

/// A response handed back to the document.
#[derive(Debug, Clone)]
pub struct Served {
    pub source: ServedFrom,
    pub response: Response,
}

impl Served {
    fn network(response: Response) -> Self {
        Self { source: ServedFrom::Network, response }
    }

    fn cache(response: Response) -> Self {
        Self { source: ServedFrom::Cache, response }
    }
}

/// Serving strategy picked for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Navigational requests: fresh HTML when online, stored copy when not.
    NetworkFirst,
    /// Everything else: stored copy when present.
    CacheFirst,
}

/// Top-level page loads and GETs that accept HTML.
pub fn is_navigational(request: &Request) -> bool {
    request.mode == RequestMode::Navigate
        || (request.is_get() && request.header("accept").is_some_and(|accept| accept.contains("text/html")))
}

pub fn classify(request: &Request) -> Strategy {
    if is_navigational(request) { Strategy::NetworkFirst } else { Strategy::CacheFirst }
}

impl OfflineCacheProxy {
    /// Serve a request intercepted from a document.
    ///
    /// Only an activated version applies its caching strategies. Before
    /// activation, after a failed install, or for a document this version
    /// does not control (`client_id`), the request goes straight to the
    /// network and the store is neither read nor written.
    ///
    /// Returns `Ok(None)` when a navigational request fails on the network
    /// and nothing is stored for it.
    ///
    /// # Errors
    ///
    /// Network errors on a cache-first miss (or a passed-through request)
    /// propagate; storage errors during lookup propagate.
    pub async fn handle_fetch(&self, client_id: Option<&str>, request: Request) -> Result<Option<Served>, Error> {
        let state = self.state().await;
        if state != WorkerState::Activated {
            tracing::debug!(version = %self.version, %state, url = %request.url, "version not active; passing through");
            return self.pass_through(&request).await.map(Some);
        }

        if let Some(id) = client_id
            && !self.controls(id).await
        {
            tracing::debug!(client = id, url = %request.url, "client not controlled; passing through");
            return self.pass_through(&request).await.map(Some);
        }

        match classify(&request) {
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await.map(Some),
        }
    }

    async fn pass_through(&self, request: &Request) -> Result<Served, Error> {
        self.fetcher.fetch(request).await.map(Served::network)
    }

    async fn network_first(&self, request: Request) -> Result<Option<Served>, Error> {
        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                let copy = response.clone();
                let url = request.url.clone();
                self.writes
                    .put(self.storage.clone(), self.version.to_string(), request, copy);
                tracing::debug!(url = %url, status = response.status, "served navigation from network");
                Ok(Some(Served::network(response)))
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "navigation offline; trying store");
                let cached = self.current_store().match_request(&request).await?;
                if cached.is_none() {
                    tracing::debug!(url = %request.url, "no stored navigation response");
                }
                Ok(cached.map(Served::cache))
            }
        }
    }

    async fn cache_first(&self, request: Request) -> Result<Served, Error> {
        if let Some(hit) = self.current_store().match_request(&request).await? {
            tracing::debug!(url = %request.url, "cache hit");
            return Ok(Served::cache(hit));
        }

        let response = self.fetcher.fetch(&request).await?;

        if response.status != 200 || response.response_type != ResponseType::Basic {
            tracing::debug!(
                url = %request.url,
                status = response.status,
                response_type = %response.response_type,
                "not caching response"
            );
            return Ok(Served::network(response));
        }

        let copy = response.clone();
        self.writes
            .put(self.storage.clone(), self.version.to_string(), request, copy);
        Ok(Served::network(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::tests::{activated_proxy, proxy, stub_with_shell};
    use shellcache_core::CacheStorage;
    use url::Url;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&Request::navigate(Url::parse("http://localhost:8080/").unwrap())), Strategy::NetworkFirst);
        assert_eq!(
            classify(&get("http://localhost:8080/about").with_header("Accept", "text/html,*/*")),
            Strategy::NetworkFirst
        );
        assert_eq!(classify(&get("http://localhost:8080/app.js").with_header("accept", "*/*")), Strategy::CacheFirst);
        assert_eq!(classify(&get("http://localhost:8080/app.js")), Strategy::CacheFirst);
        assert_eq!(
            classify(
                &get("http://localhost:8080/form")
                    .with_method("POST")
                    .with_header("accept", "text/html")
            ),
            Strategy::CacheFirst
        );
    }

    #[tokio::test]
    async fn test_navigation_online_returns_live_and_stores() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;

        fetcher.respond("http://localhost:8080/about", Response::new(200, "live about"));
        let request = Request::navigate(Url::parse("http://localhost:8080/about").unwrap());
        let served = proxy.handle_fetch(None, request.clone()).await.unwrap().unwrap();

        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.body.as_ref(), b"live about");

        proxy.flush_writes().await;
        let stored = storage.store("workout-pro-v5").match_request(&request).await.unwrap().unwrap();
        assert_eq!(stored.body.as_ref(), b"live about");
    }

    #[tokio::test]
    async fn test_navigation_online_prefers_network_over_store() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;

        fetcher.respond("http://localhost:8080/", Response::new(200, "fresh shell"));
        let request = Request::navigate(Url::parse("http://localhost:8080/").unwrap());
        let served = proxy.handle_fetch(None, request).await.unwrap().unwrap();

        assert_eq!(served.source, ServedFrom::Network);
        assert_eq!(served.response.body.as_ref(), b"fresh shell");
    }

    #[tokio::test]
    async fn test_navigation_error_status_still_stored() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;

        fetcher.respond("http://localhost:8080/gone", Response::new(404, "missing"));
        let request = Request::navigate(Url::parse("http://localhost:8080/gone").unwrap());
        let served = proxy.handle_fetch(None, request.clone()).await.unwrap().unwrap();
        assert_eq!(served.response.status, 404);

        proxy.flush_writes().await;
        assert!(storage.store("workout-pro-v5").match_request(&request).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_navigation_offline_falls_back_to_store() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;

        fetcher.set_offline(true);
        let request = Request::navigate(Url::parse("http://localhost:8080/index.html").unwrap());
        let served = proxy.handle_fetch(None, request).await.unwrap().unwrap();

        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.body.as_ref(), b"<html>index</html>");
    }

    #[tokio::test]
    async fn test_navigation_offline_uncached_is_unresolved() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;

        fetcher.set_offline(true);
        let request = Request::navigate(Url::parse("http://localhost:8080/never-seen").unwrap());
        assert!(proxy.handle_fetch(None, request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generic_hit_skips_network() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;
        let installed_calls = fetcher.calls();

        let served = proxy
            .handle_fetch(None, get("http://localhost:8080/index.html"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(fetcher.calls(), installed_calls);
    }

    #[tokio::test]
    async fn test_generic_hit_with_fresh_spy() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let store = storage.open_store("workout-pro-v5").await.unwrap();
        store
            .put(&get("http://localhost:8080/app.js"), &Response::new(200, "js"))
            .await
            .unwrap();

        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;
        let installed_calls = fetcher.calls();

        let served = proxy
            .handle_fetch(None, get("http://localhost:8080/app.js"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(served.response.body.as_ref(), b"js");
        assert_eq!(fetcher.calls(), installed_calls);
    }

    #[tokio::test]
    async fn test_redundant_worker_neither_serves_nor_stores() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        fetcher.fail("http://localhost:8080/index.html", "connection refused");
        let proxy = proxy("workout-pro-v7", &storage, fetcher.clone());
        proxy.install().await.unwrap_err();
        assert_eq!(proxy.state().await, WorkerState::Redundant);
        storage.delete("workout-pro-v7").await.unwrap();

        fetcher.respond("http://localhost:8080/app.js", Response::new(200, "js"));
        let served = proxy
            .handle_fetch(None, get("http://localhost:8080/app.js"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(served.source, ServedFrom::Network);

        let navigation = Request::navigate(Url::parse("http://localhost:8080/").unwrap());
        let served = proxy.handle_fetch(None, navigation).await.unwrap().unwrap();
        assert_eq!(served.source, ServedFrom::Network);

        proxy.flush_writes().await;
        assert!(storage.keys().await.unwrap().is_empty());
        assert_eq!(proxy.write_failures(), 0);
    }

    #[tokio::test]
    async fn test_installed_worker_does_not_read_store() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = proxy("workout-pro-v5", &storage, fetcher.clone());
        proxy.install().await.unwrap();

        fetcher.set_offline(true);
        let result = proxy.handle_fetch(None, get("http://localhost:8080/index.html")).await;
        assert!(matches!(result, Err(Error::Network(_))));

        let navigation = Request::navigate(Url::parse("http://localhost:8080/index.html").unwrap());
        assert!(matches!(proxy.handle_fetch(None, navigation).await, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_generic_miss_basic_200_stored() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;

        fetcher.respond("http://localhost:8080/app.js", Response::new(200, "js"));
        let served = proxy
            .handle_fetch(None, get("http://localhost:8080/app.js"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(served.source, ServedFrom::Network);

        proxy.flush_writes().await;
        fetcher.set_offline(true);
        let served = proxy
            .handle_fetch(None, get("http://localhost:8080/app.js"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response.body.as_ref(), b"js");
    }

    #[tokio::test]
    async fn test_generic_miss_uncacheable_not_stored() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;

        let cases = [
            ("https://cdn.example/font.woff2", Response::opaque()),
            ("https://cdn.example/lib.js", Response::new(200, "lib").with_type(ResponseType::Cors)),
            ("http://localhost:8080/missing.js", Response::new(404, "nope")),
        ];
        for (url, response) in &cases {
            fetcher.respond(url, response.clone());
            let served = proxy.handle_fetch(None, get(url)).await.unwrap().unwrap();
            assert_eq!(served.response.status, response.status);
            assert_eq!(served.response.response_type, response.response_type);
        }

        proxy.flush_writes().await;
        let store = storage.store("workout-pro-v5");
        for (url, _) in &cases {
            assert!(store.match_request(&get(url)).await.unwrap().is_none(), "{url} was stored");
        }
    }

    #[tokio::test]
    async fn test_generic_offline_uncached_errors() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;

        fetcher.set_offline(true);
        let result = proxy.handle_fetch(None, get("http://localhost:8080/app.js")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_uncontrolled_client_passes_through() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let fetcher = stub_with_shell();
        let proxy = activated_proxy("workout-pro-v5", &storage, fetcher.clone()).await;
        proxy.clients().connect("tab-1", None).await;

        fetcher.respond("http://localhost:8080/app.js", Response::new(200, "js"));
        let served = proxy
            .handle_fetch(Some("tab-1"), get("http://localhost:8080/app.js"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(served.source, ServedFrom::Network);

        proxy.flush_writes().await;
        assert!(
            storage
                .store("workout-pro-v5")
                .match_request(&get("http://localhost:8080/app.js"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
