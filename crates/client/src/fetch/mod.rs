//! HTTP fetch pipeline used by the proxy for every network access.
//!
//! ### Response tainting
//! - Same-origin responses are `basic`.
//! - Cross-origin responses are `cors`, or `opaque` when the request was
//!   issued in `no-cors` mode (status 0, no headers, empty body).
//! - `same-origin` mode requests to another origin fail without touching the network.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

#[cfg(any(test, feature = "test-util"))]
pub mod stub;
pub mod url;

use bytes::Bytes;
use reqwest::{Client, Method, header};
use shellcache_core::{AppConfig, Error, Headers, Request, RequestMode, Response, ResponseType};
use std::time::{Duration, Instant};

#[cfg(any(test, feature = "test-util"))]
pub use stub::StubFetcher;
pub use self::url::{UrlError, resolve, same_origin};

/// Performs the network half of request handling.
///
/// The proxy only ever talks to the network through this trait, so tests can
/// swap in canned responses and count calls.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the request from the network.
    ///
    /// Any rejection (offline, DNS, reset, timeout) is `Error::Network`.
    /// HTTP error statuses are not rejections.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "shellcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed fetcher for one document origin.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
    origin: ::url::Url,
}

impl HttpFetcher {
    /// Create a fetcher for documents served from `origin`.
    pub fn new(config: FetchConfig, origin: ::url::Url) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config, origin })
    }

    fn response_type(&self, request: &Request) -> ResponseType {
        if same_origin(&self.origin, &request.url) {
            ResponseType::Basic
        } else if request.mode == RequestMode::NoCors {
            ResponseType::Opaque
        } else {
            ResponseType::Cors
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        if request.mode == RequestMode::SameOrigin && !same_origin(&self.origin, &request.url) {
            return Err(Error::Network(format!("{} is cross-origin in same-origin mode", request.url)));
        }

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} {}: {}", request.method, request.url, e)))?;

        let response_type = self.response_type(request);
        if response_type == ResponseType::Opaque {
            tracing::debug!("fetched {} as opaque in {}ms", request.url, start.elapsed().as_millis());
            return Ok(Response::opaque());
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().to_string();
        let headers = collect_headers(response.headers());

        let bytes: Bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} -> {} ({}) in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes,
            response_type,
            url: final_url,
        })
    }
}

fn collect_headers(map: &header::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        if let Ok(value) = value.to_str() {
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
    }
    headers
}
