//! The offline cache proxy: three lifecycle handlers over one versioned store.
//!
//! ### Lifecycle
//! - `install` fetches the manifest into the store named by the version tag
//!   and asks to skip waiting.
//! - `activate` deletes every other store, claims connected clients and
//!   posts them `SW_UPDATED`.
//! - `fetch` serves navigations network-first and everything else cache-first.
//!
//! The version tag is a value handed to the proxy, so several versions can
//! run side by side over one [`CacheStorage`] and one [`ClientRegistry`].

pub mod activate;
pub mod clients;
pub mod fetch;
pub mod install;
pub mod write_behind;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use shellcache_core::{AppConfig, CacheStorage, Error, Request, Store};
use tokio::sync::RwLock;

use crate::fetch::Fetcher;
use crate::manifest::Manifest;

pub use activate::ActivateOutcome;
pub use clients::{ClientMessage, ClientRegistry};
pub use fetch::{Served, ServedFrom, Strategy, classify, is_navigational};
pub use install::InstallOutcome;
pub use write_behind::WriteBehind;

/// Name of the store a proxy version owns, e.g. `workout-pro-v5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheVersion(String);

impl CacheVersion {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self(config.cache_name())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a proxy version is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this version will never serve.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// An event the host delivers to the proxy.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Install,
    Activate,
    Fetch { client_id: Option<String>, request: Request },
}

/// What handling an event produced.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallOutcome),
    Activated(ActivateOutcome),
    /// `None` when a navigation failed offline with nothing stored.
    Fetched(Option<Served>),
}

/// One version of the offline cache proxy.
pub struct OfflineCacheProxy {
    version: CacheVersion,
    manifest: Manifest,
    storage: CacheStorage,
    fetcher: Arc<dyn Fetcher>,
    clients: ClientRegistry,
    state: RwLock<WorkerState>,
    writes: WriteBehind,
}

impl OfflineCacheProxy {
    pub fn new(
        version: CacheVersion, manifest: Manifest, storage: CacheStorage, fetcher: Arc<dyn Fetcher>,
        clients: ClientRegistry,
    ) -> Self {
        Self {
            version,
            manifest,
            storage,
            fetcher,
            clients,
            state: RwLock::new(WorkerState::Parsed),
            writes: WriteBehind::new(),
        }
    }

    /// Run the handler for one lifecycle event.
    ///
    /// The returned future completes when the step is done; detached cache
    /// writes started by a fetch may still be running.
    pub async fn dispatch(&self, event: LifecycleEvent) -> Result<EventOutcome, Error> {
        match event {
            LifecycleEvent::Install => self.install().await.map(EventOutcome::Installed),
            LifecycleEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            LifecycleEvent::Fetch { client_id, request } => self
                .handle_fetch(client_id.as_deref(), request)
                .await
                .map(EventOutcome::Fetched),
        }
    }

    /// Register a document. It is controlled right away if this version is active.
    ///
    /// The state lock is held until the client is registered, so activation
    /// cannot claim in between.
    pub async fn connect_client(&self, id: &str) -> bool {
        let state = self.state.read().await;
        let controller = (*state == WorkerState::Activated).then(|| self.version.to_string());
        self.clients.connect(id, controller).await
    }

    /// Whether this version controls the client.
    pub async fn controls(&self, id: &str) -> bool {
        self.clients.controller(id).await.as_deref() == Some(self.version.as_str())
    }

    /// Wait for every detached cache write started so far.
    pub async fn flush_writes(&self) {
        self.writes.flush().await;
    }

    /// Detached cache writes that failed.
    pub fn write_failures(&self) -> u64 {
        self.writes.failures()
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
    }

    /// Handle to this version's store; lookups miss if it does not exist yet.
    fn current_store(&self) -> Store {
        self.storage.store(self.version.as_str())
    }
}
