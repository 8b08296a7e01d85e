//! Canned-response fetcher for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use shellcache_core::{Error, Request, Response};

use super::Fetcher;

#[derive(Clone)]
enum Route {
    Respond(Response),
    Fail(String),
}

/// Fetcher that answers from a URL table and counts every call.
///
/// Unknown URLs and every URL while offline reject with `Error::Network`.
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, Route>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `response`.
    pub fn respond(&self, url: &str, response: Response) -> &Self {
        self.lock_routes().insert(url.to_string(), Route::Respond(response));
        self
    }

    /// Reject `url` with a network error.
    pub fn fail(&self, url: &str, reason: &str) -> &Self {
        self.lock_routes().insert(url.to_string(), Route::Fail(reason.to_string()));
        self
    }

    /// Reject every request while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock_routes(&self) -> std::sync::MutexGuard<'_, HashMap<String, Route>> {
        self.routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url.to_string();

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }

        let route = self.lock_routes().get(&url).cloned();
        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail(reason)) => Err(Error::Network(reason)),
            None => Err(Error::Network(format!("no route for {url}"))),
        }
    }
}
