//! Install: materialize the version's store from the manifest.

use serde::Serialize;
use shellcache_core::{Error, Request, Response};

use super::{OfflineCacheProxy, WorkerState};

/// Result of a successful install.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct InstallOutcome {
    pub version: String,
    /// Manifest entries written to the store.
    pub cached: usize,
    /// The version asks to take over open clients without waiting for a reload.
    pub skip_waiting: bool,
}

impl OfflineCacheProxy {
    /// Open (or create) the version's store and seed it with every manifest URL.
    ///
    /// Manifest entries are fetched concurrently and written in one batch once
    /// all of them came back OK, so a failed install leaves nothing behind.
    ///
    /// # Errors
    ///
    /// `InstallFailed` naming the first manifest URL that was rejected by the
    /// network or answered with a non-2xx status. The worker is then redundant.
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        self.set_state(WorkerState::Installing).await;
        tracing::info!(version = %self.version, entries = self.manifest.len(), "installing");

        match self.precache().await {
            Ok(cached) => {
                self.set_state(WorkerState::Installed).await;
                tracing::info!(version = %self.version, cached, "installed; skip waiting");
                Ok(InstallOutcome { version: self.version.to_string(), cached, skip_waiting: true })
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                tracing::warn!(version = %self.version, error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        let store = self.storage.open_store(self.version.as_str()).await?;

        let fetches = self.manifest.requests().map(|request| self.fetch_manifest_entry(request));
        let pairs = futures::future::try_join_all(fetches).await?;

        store.put_all(&pairs).await?;
        Ok(pairs.len())
    }

    async fn fetch_manifest_entry(&self, request: Request) -> Result<(Request, Response), Error> {
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| Error::InstallFailed { url: request.url.to_string(), reason: e.to_string() })?;

        if !response.ok() {
            return Err(Error::InstallFailed {
                url: request.url.to_string(),
                reason: format!("status {}", response.status),
            });
        }

        tracing::debug!(url = %request.url, bytes = response.body.len(), "precached");
        Ok((request, response))
    }
}
