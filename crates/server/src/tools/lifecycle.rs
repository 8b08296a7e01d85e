//! sw_install and sw_activate tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;
use shellcache_client::{ActivateOutcome, InstallOutcome, OfflineCacheProxy, WorkerState};

use super::json_result;

/// Output from the sw_install tool.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SwInstallOutput {
    pub install: InstallOutcome,
    /// Present when the install asked to skip waiting and activation ran.
    pub activate: Option<ActivateOutcome>,
    pub state: WorkerState,
}

/// Output from the sw_activate tool.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SwActivateOutput {
    pub activate: ActivateOutcome,
    pub state: WorkerState,
}

/// Install the current version, then activate it right away if it asks to skip waiting.
pub async fn install_impl(proxy: &OfflineCacheProxy) -> Result<CallToolResult, McpError> {
    let install = proxy.install().await?;
    let activate = if install.skip_waiting { Some(proxy.activate().await?) } else { None };

    json_result(&SwInstallOutput { install, activate, state: proxy.state().await })
}

pub async fn activate_impl(proxy: &OfflineCacheProxy) -> Result<CallToolResult, McpError> {
    let activate = proxy.activate().await?;
    json_result(&SwActivateOutput { activate, state: proxy.state().await })
}
