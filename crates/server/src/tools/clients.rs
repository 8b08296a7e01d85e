//! client_connect, client_disconnect and client_messages tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{ClientMessage, OfflineCacheProxy};
use shellcache_core::Error;

use super::json_result;
use crate::error::ToolError;

/// Parameters for the client_connect tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientConnectParams {
    /// Id of the document being opened.
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientConnectOutput {
    pub client_id: String,
    /// False if the id was already connected.
    pub connected: bool,
    /// Whether the current version controls the document.
    pub controlled: bool,
}

/// Parameters for the client_disconnect tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientDisconnectParams {
    /// Id of the document being closed.
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientDisconnectOutput {
    pub client_id: String,
}

/// Parameters for the client_messages tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientMessagesParams {
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientMessagesOutput {
    pub client_id: String,
    /// Messages posted since the last drain, oldest first.
    pub messages: Vec<ClientMessage>,
}

pub async fn connect_impl(proxy: &OfflineCacheProxy, params: ClientConnectParams) -> Result<CallToolResult, McpError> {
    if params.client_id.trim().is_empty() {
        return Err(Error::InvalidInput("client_id cannot be empty".into()).into());
    }

    let connected = proxy.connect_client(&params.client_id).await;
    let controlled = proxy.controls(&params.client_id).await;
    tracing::debug!(client = %params.client_id, connected, controlled, "client connected");

    json_result(&ClientConnectOutput { client_id: params.client_id, connected, controlled })
}

/// Forget a closed document. Later activations neither claim nor notify it.
pub async fn disconnect_impl(
    proxy: &OfflineCacheProxy, params: ClientDisconnectParams,
) -> Result<CallToolResult, McpError> {
    if !proxy.clients().disconnect(&params.client_id).await {
        return Err(ToolError::UnknownClient(params.client_id).into());
    }
    tracing::debug!(client = %params.client_id, "client disconnected");

    json_result(&ClientDisconnectOutput { client_id: params.client_id })
}

pub async fn messages_impl(proxy: &OfflineCacheProxy, params: ClientMessagesParams) -> Result<CallToolResult, McpError> {
    let messages = proxy
        .clients()
        .drain(&params.client_id)
        .await
        .ok_or_else(|| ToolError::UnknownClient(params.client_id.clone()))?;

    json_result(&ClientMessagesOutput { client_id: params.client_id, messages })
}
