use relay_jsonrpc::{JsonRpcErrorObject, ToJsonRpcError};

/// Protocol-level errors: anything that is wrong about the request itself
/// rather than about executing a tool. Tool-execution failures never become
/// one of these — they are folded into a successful `CallToolResult`
/// (`isError: true`) by the dispatcher instead.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("unsupported protocol type at this prefix")]
    UnsupportedProtocolType,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("session not found")]
    SessionNotFound,

    #[error("connection closed")]
    ConnectionClosed,
}

impl ToJsonRpcError for McpError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            McpError::InvalidParams(msg) => JsonRpcErrorObject::invalid_params(msg),
            McpError::ToolNotFound(name) => {
                JsonRpcErrorObject::method_not_found(&format!("tools/call:{name}"))
            }
            McpError::UnsupportedProtocolType => {
                JsonRpcErrorObject::invalid_params("unsupported protocol type at this prefix")
            }
            McpError::Internal(msg) => JsonRpcErrorObject::internal_error(Some(msg.clone())),
            McpError::SessionNotFound => JsonRpcErrorObject::server_error(
                relay_jsonrpc::error_codes::CONNECTION_CLOSED,
                "Invalid or expired session",
                None,
            ),
            McpError::ConnectionClosed => JsonRpcErrorObject::server_error(
                relay_jsonrpc::error_codes::CONNECTION_CLOSED,
                "connection closed",
                None,
            ),
        }
    }
}
