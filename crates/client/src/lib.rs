//! Client side of shellcache.
//!
//! This crate provides the HTTP fetch pipeline, manifest resolution and the
//! offline cache proxy (install/activate/fetch handlers) that the server
//! hosts.

pub mod fetch;
pub mod manifest;
pub mod proxy;

pub use fetch::{FetchConfig, Fetcher, HttpFetcher};
pub use manifest::Manifest;
pub use proxy::{
    ActivateOutcome, CacheVersion, ClientMessage, ClientRegistry, EventOutcome, InstallOutcome, LifecycleEvent,
    OfflineCacheProxy, Served, ServedFrom, WorkerState,
};
