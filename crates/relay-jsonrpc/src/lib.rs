//! A transport-agnostic JSON-RPC 2.0 envelope and dispatcher.
//!
//! This crate knows nothing about HTTP, SSE, or MCP method names. It models
//! the wire envelope (request/response/notification/error) and a small
//! dispatcher that maps a method string to a handler, converting the
//! handler's domain error into a JSON-RPC error object. Everything MCP-
//! specific — method names, session binding, tool semantics — lives above
//! this crate.

pub mod dispatcher;
pub mod error;
pub mod notification;
pub mod request;
pub mod response;
pub mod types;

pub use dispatcher::{JsonRpcDispatcher, JsonRpcHandler, SessionContext, ToJsonRpcError};
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse, ResponseResult};
pub use types::{JsonRpcVersion, RequestId};

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes, plus the server-error range the MCP
/// gateway uses for its own conditions (e.g. session expiry).
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const CONNECTION_CLOSED: i64 = -32000;
}
