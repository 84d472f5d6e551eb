use async_trait::async_trait;
use relay_jsonrpc::request::RequestParams;
use relay_protocol::tools::{CallToolResult, Tool};
use relay_protocol::{ClientCapabilities, Implementation, InitializeRequest, McpVersion};

use crate::error::TransportError;

/// The `initialize` request params every transport sends once, right after
/// coming up, to complete the MCP handshake before it is considered ready.
pub fn initialize_params() -> Option<RequestParams> {
    let request = InitializeRequest {
        protocol_version: McpVersion::CURRENT.as_str().to_string(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation::new("relay-gateway", env!("CARGO_PKG_VERSION")),
    };
    match serde_json::to_value(request).ok()? {
        serde_json::Value::Object(map) => Some(RequestParams::Object(map.into_iter().collect())),
        _ => None,
    }
}

/// A live connection to one upstream MCP server. One `RuntimeUnit` holds
/// exactly one transport; which implementation backs it is fixed at
/// compile time of the unit from the tenant's declared protocol type.
///
/// `start`/`stop` are serialized by each implementation's own lock so an
/// `on-demand` unit can never end up with two child processes racing to
/// come up, or a stop racing a start into a half-torn-down state. Both are
/// idempotent: starting an already-running transport or stopping one that
/// isn't running is a no-op that still returns `Ok`. `start` completes the
/// `initialize` handshake before returning, so a transport whose upstream
/// never comes up as a valid MCP server fails `start` rather than surfacing
/// the problem on the first `fetch_tools`/`call_tool`. Callers that need
/// both in one operation (a reload that restarts a transport) must take
/// `start` before `stop` to avoid a lock-order inversion with the reverse
/// sequence.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn start(&self) -> Result<(), TransportError>;
    async fn stop(&self) -> Result<(), TransportError>;
    fn is_running(&self) -> bool;
    async fn fetch_tools(&self) -> Result<Vec<Tool>, TransportError>;
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, TransportError>;
}
