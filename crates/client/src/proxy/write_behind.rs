//! Detached cache writes.
//!
//! A write is spawned after the response copy is taken and is never awaited
//! by the request that caused it. Each write runs at most once; a failure is
//! logged and counted, then dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use shellcache_core::{CacheStorage, Request, Response};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Tracks in-flight writes and counts the ones that failed.
#[derive(Debug, Clone, Default)]
pub struct WriteBehind {
    tracker: TaskTracker,
    failures: Arc<AtomicU64>,
}

impl WriteBehind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a put of `response` for `request` into `store_name`.
    ///
    /// The store is opened (and created if absent) inside the task.
    pub fn put(&self, storage: CacheStorage, store_name: String, request: Request, response: Response) -> JoinHandle<()> {
        let failures = Arc::clone(&self.failures);
        self.tracker.spawn(async move {
            let result = match storage.open_store(&store_name).await {
                Ok(store) => store.put(&request, &response).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => tracing::debug!(store = %store_name, url = %request.url, "cached response"),
                Err(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(store = %store_name, url = %request.url, error = %e, "dropped cache write");
                }
            }
        })
    }

    /// Wait for every write spawned so far.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Writes that failed since creation.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
