//! cache_keys tool implementation.
//!
//! Lists store names, or the entries of one store.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::OfflineCacheProxy;
use shellcache_core::{Error, cache::EntryInfo};

use crate::tools::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// List the entries of this store instead of the store names.
    #[serde(default)]
    pub store: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreSummary {
    pub name: String,
    /// The store the running version owns.
    pub current: bool,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CacheKeysOutput {
    Stores { stores: Vec<StoreSummary> },
    Entries { store: String, entries: Vec<EntryInfo> },
}

pub async fn keys_impl(proxy: &OfflineCacheProxy, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let storage = proxy.storage();

    let output = match params.store {
        None => {
            let current = proxy.version().as_str();
            let stores = storage
                .keys()
                .await?
                .into_iter()
                .map(|name| StoreSummary { current: name == current, name })
                .collect();
            CacheKeysOutput::Stores { stores }
        }
        Some(name) => {
            if !storage.has(&name).await? {
                return Err(Error::CacheMiss(format!("no store named {name}")).into());
            }
            let entries = storage.store(&name).keys().await?;
            CacheKeysOutput::Entries { store: name, entries }
        }
    };

    json_result(&output)
}
