//! Errors raised by the tool layer itself.
//!
//! Proxy and storage failures arrive as `shellcache_core::Error` and convert
//! on their own; these cover what only the host can get wrong.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The client id was never connected.
    #[error("UNKNOWN_CLIENT: {0}")]
    UnknownClient(String),

    /// The current version's store cannot be purged while it serves.
    #[error("STORE_IN_USE: {0}")]
    StoreInUse(String),

    /// Tool output could not be encoded.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::UnknownClient(_) | ToolError::StoreInUse(_) => -32602,
            ToolError::Serialize(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err: McpError = ToolError::UnknownClient("tab-9".into()).into();
        assert_eq!(err.code, ErrorCode(-32602));
        assert_eq!(err.message, "UNKNOWN_CLIENT: tab-9");

        let err: McpError = ToolError::Serialize("boom".into()).into();
        assert_eq!(err.code, ErrorCode(-32603));
    }
}
