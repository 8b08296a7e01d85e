//! The ordered list of URLs every install must cache.

use shellcache_core::{AppConfig, Error, Request};
use url::Url;

use crate::fetch::resolve;

/// Resolved, de-duplicated precache list. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    urls: Vec<Url>,
}

impl Manifest {
    /// Resolve every entry against `origin`, keeping manifest order.
    ///
    /// # Errors
    ///
    /// `InvalidUrl` if an entry does not resolve to an http(s) URL or two
    /// entries resolve to the same URL; `InvalidInput` if the list is empty.
    pub fn resolve(origin: &Url, entries: &[impl AsRef<str>]) -> Result<Self, Error> {
        if entries.is_empty() {
            return Err(Error::InvalidInput("manifest must list at least one URL".into()));
        }

        let mut urls: Vec<Url> = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.as_ref();
            let url = resolve(origin, entry).map_err(|e| Error::InvalidUrl(format!("manifest entry {entry:?}: {e}")))?;
            if urls.contains(&url) {
                return Err(Error::InvalidUrl(format!("manifest entry {entry:?} duplicates {url}")));
            }
            urls.push(url);
        }

        Ok(Self { urls })
    }

    /// Build from the configured origin and manifest.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        Self::resolve(&origin, &config.manifest)
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Precache requests, one GET per entry.
    pub fn requests(&self) -> impl Iterator<Item = Request> + '_ {
        self.urls.iter().cloned().map(Request::get)
    }
}
