//! cache_purge tool implementation.
//!
//! Deletes one named store, or a single entry in it. Dropping the current
//! version's whole store is refused.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{OfflineCacheProxy, fetch::resolve};
use shellcache_core::{Error, Request};
use url::Url;

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Name of the store to delete from.
    pub store: String,

    /// Delete only the GET entry for this URL (absolute, or a path on the origin).
    #[serde(default)]
    pub url: Option<String>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// False if no such store or entry existed.
    pub deleted: bool,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(
    proxy: &OfflineCacheProxy, origin: &Url, params: CachePurgeParams,
) -> Result<CallToolResult, McpError> {
    if params.store.is_empty() {
        return Err(Error::InvalidInput("store cannot be empty".to_string()).into());
    }

    if let Some(raw) = params.url.as_deref() {
        let url = resolve(origin, raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
        let deleted = proxy.storage().store(&params.store).delete(&Request::get(url.clone())).await?;
        tracing::info!(store = %params.store, %url, deleted, "purged entry");

        return json_result(&CachePurgeOutput { store: params.store, url: Some(url.to_string()), deleted });
    }

    if params.store == proxy.version().as_str() {
        return Err(ToolError::StoreInUse(params.store).into());
    }

    let deleted = proxy.storage().delete(&params.store).await?;
    tracing::info!(store = %params.store, deleted, "purged store");

    json_result(&CachePurgeOutput { store: params.store, url: None, deleted })
}
