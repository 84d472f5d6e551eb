use std::collections::HashMap;
use std::sync::Arc;

use relay_mcp_proxy::Transport;
use relay_protocol::tools::Tool;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtoType {
    Http,
    Stdio,
    Sse,
    StreamableHttp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
}

/// One `router` entry from the config: binds a URL prefix to an HTTP server
/// and/or an MCP server by name. A router whose named server doesn't
/// resolve is kept (with an idle runtime unit) rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterEntry {
    pub prefix: String,
    pub server_name: Option<String>,
    pub mcp_server_name: Option<String>,
    pub cors: Option<CorsConfig>,
    pub auth: Option<AuthConfig>,
    pub sse_prefix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgPosition {
    Path,
    Query,
    Header,
    FormData,
    Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolArg {
    pub name: String,
    pub position: ArgPosition,
    #[serde(rename = "type")]
    pub arg_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Http,
    Socks5,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    pub kind: ProxyKind,
}

/// An HTTP-backed tool recipe: everything the tool pipeline needs to
/// template a request and reshape the response, immutable for the
/// lifetime of the state snapshot that compiled it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    pub method: String,
    pub endpoint: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub args: Vec<ToolArg>,
    #[serde(default)]
    pub request_body: Option<String>,
    #[serde(default)]
    pub response_body: Option<String>,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    pub name: String,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum McpServerType {
    Stdio,
    Sse,
    StreamableHttp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartupPolicy {
    OnStart,
    OnDemand,
}

/// Deep-equality on this type (derived) is exactly the reuse test the
/// state engine runs across a reload: same type, command, url, args, env
/// means the live transport is moved into the new snapshot untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MCPServerConfig {
    pub server_type: McpServerType,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
    pub policy: StartupPolicy,
    #[serde(default)]
    pub preinstalled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub routers: Vec<RouterEntry>,
    #[serde(default)]
    pub http_servers: HashMap<String, HttpServerConfig>,
    #[serde(default)]
    pub mcp_servers: HashMap<String, MCPServerConfig>,
}

/// The compiled state for one URL prefix. Built by the state engine from a
/// config snapshot and never mutated after publication; a reload replaces
/// the whole map, not individual units.
pub struct RuntimeUnit {
    pub prefix: String,
    pub proto_type: Option<ProtoType>,
    pub router: RouterEntry,
    pub server_config: Option<HttpServerConfig>,
    pub mcp_server_config: Option<MCPServerConfig>,
    pub tools: HashMap<String, ToolConfig>,
    pub tool_schemas: Vec<Tool>,
    pub transport: Option<Arc<dyn Transport>>,
}

impl RuntimeUnit {
    pub fn is_idle(&self) -> bool {
        self.proto_type.is_none()
    }
}
