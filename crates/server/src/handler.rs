//! MCP server handler implementation.
//!
//! Each tool call is one lifecycle event or store inspection delivered to the
//! hosted proxy version.
use std::sync::Arc;

use crate::tools::{
    ClientConnectParams, ClientDisconnectParams, ClientMessagesParams, SwFetchParams,
    cache::{CacheKeysParams, CacheMatchParams, CachePurgeParams, keys_impl, match_impl, purge_impl},
    clients::{connect_impl, disconnect_impl, messages_impl},
    fetch::fetch_impl,
    lifecycle::{activate_impl, install_impl},
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::OfflineCacheProxy;
use url::Url;

/// The MCP server handler hosting one proxy version.
#[derive(Clone)]
pub struct ShellcacheServer {
    tool_router: ToolRouter<Self>,
    proxy: Arc<OfflineCacheProxy>,
    origin: Url,
}

#[tool_router]
impl ShellcacheServer {
    /// Create a handler for `proxy`; relative URLs resolve against `origin`.
    pub fn new(proxy: Arc<OfflineCacheProxy>, origin: Url) -> Self {
        Self { tool_router: Self::tool_router(), proxy, origin }
    }

    #[tool(
        description = "Install the current version: fetch every manifest URL into its store. Activates right away when the version skips waiting."
    )]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.proxy).await
    }

    #[tool(description = "Activate the installed version: delete stale stores, claim clients, post SW_UPDATED.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.proxy).await
    }

    #[tool(
        description = "Issue a request through the proxy. Navigations are network-first, everything else cache-first. Returns source, status, type, headers and body."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.proxy, &self.origin, params.0).await
    }

    #[tool(description = "Register an open document by id. It is controlled immediately if the version is active.")]
    async fn client_connect(&self, params: Parameters<ClientConnectParams>) -> Result<CallToolResult, McpError> {
        connect_impl(&self.proxy, params.0).await
    }

    #[tool(description = "Forget a closed document. Later activations neither claim nor notify it.")]
    async fn client_disconnect(&self, params: Parameters<ClientDisconnectParams>) -> Result<CallToolResult, McpError> {
        disconnect_impl(&self.proxy, params.0).await
    }

    #[tool(description = "Drain and return the messages posted to a document.")]
    async fn client_messages(&self, params: Parameters<ClientMessagesParams>) -> Result<CallToolResult, McpError> {
        messages_impl(&self.proxy, params.0).await
    }

    #[tool(description = "List store names (marking the current one), or the entries of a named store.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.proxy, params.0).await
    }

    #[tool(description = "Look a URL up in the current store, a named store, or every store. No network access.")]
    async fn cache_match(&self, params: Parameters<CacheMatchParams>) -> Result<CallToolResult, McpError> {
        match_impl(&self.proxy, &self.origin, params.0).await
    }

    #[tool(
        description = "Delete a named store, or one URL's entry in it. Only entry deletion is allowed in the current version's store."
    )]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.proxy, &self.origin, params.0).await
    }
}

impl ServerHandler for ShellcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(format!(
                "Offline cache proxy for {}. Hosted version: {}.",
                self.origin,
                self.proxy.version()
            )),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
