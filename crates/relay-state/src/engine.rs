use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use relay_mcp_proxy::{SseTransport, StdioTransport, StreamableHttpTransport, Transport};
use relay_protocol::tools::{Tool, ToolSchema};
use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::StateError;
use crate::model::{
    AuthConfig, CorsConfig, GatewayConfig, MCPServerConfig, McpServerType, ProtoType,
    RuntimeUnit, StartupPolicy, ToolConfig,
};

const TRANSPORT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// The published routing table: one immutable snapshot per configuration
/// generation. Lookups are plain `HashMap::get`, so every accessor here is
/// O(1).
pub struct State {
    units: HashMap<String, Arc<RuntimeUnit>>,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl State {
    pub fn empty() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    pub fn unit(&self, prefix: &str) -> Option<&Arc<RuntimeUnit>> {
        self.units.get(prefix)
    }

    pub fn get_proto_type(&self, prefix: &str) -> Option<ProtoType> {
        self.unit(prefix).and_then(|u| u.proto_type)
    }

    pub fn get_tool_schemas(&self, prefix: &str) -> Option<&[Tool]> {
        self.unit(prefix).map(|u| u.tool_schemas.as_slice())
    }

    pub fn get_tool(&self, prefix: &str, name: &str) -> Option<&ToolConfig> {
        self.unit(prefix).and_then(|u| u.tools.get(name))
    }

    pub fn get_server_config(&self, prefix: &str) -> Option<&crate::model::HttpServerConfig> {
        self.unit(prefix).and_then(|u| u.server_config.as_ref())
    }

    pub fn get_mcp_server_config(&self, prefix: &str) -> Option<&MCPServerConfig> {
        self.unit(prefix).and_then(|u| u.mcp_server_config.as_ref())
    }

    pub fn get_transport(&self, prefix: &str) -> Option<Arc<dyn Transport>> {
        self.unit(prefix).and_then(|u| u.transport.clone())
    }

    pub fn get_cors(&self, prefix: &str) -> Option<&CorsConfig> {
        self.unit(prefix).and_then(|u| u.router.cors.as_ref())
    }

    pub fn get_auth(&self, prefix: &str) -> Option<&AuthConfig> {
        self.unit(prefix).and_then(|u| u.router.auth.as_ref())
    }

    pub fn get_sse_prefix(&self, prefix: &str) -> Option<&str> {
        self.unit(prefix).and_then(|u| u.router.sse_prefix.as_deref())
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(|s| s.as_str())
    }
}

fn build_tool_schema(tool: &ToolConfig) -> Tool {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for arg in &tool.args {
        properties.insert(arg.name.clone(), serde_json::json!({ "type": arg.arg_type }));
        if arg.required {
            required.push(arg.name.clone());
        }
    }
    let schema = ToolSchema {
        schema_type: "object".to_string(),
        properties: Some(Value::Object(properties)),
        required: if required.is_empty() { None } else { Some(required) },
    };
    let built = Tool::new(tool.name.clone(), schema);
    match &tool.description {
        Some(desc) => built.with_description(desc.clone()),
        None => built,
    }
}

fn resolve_proto_type(
    mcp_config: Option<&MCPServerConfig>,
    server_config: Option<&crate::model::HttpServerConfig>,
) -> Option<ProtoType> {
    if let Some(mcp) = mcp_config {
        return Some(match mcp.server_type {
            McpServerType::Stdio => ProtoType::Stdio,
            McpServerType::Sse => ProtoType::Sse,
            McpServerType::StreamableHttp => ProtoType::StreamableHttp,
        });
    }
    if server_config.is_some() {
        return Some(ProtoType::Http);
    }
    None
}

fn build_transport(prefix: &str, cfg: &MCPServerConfig) -> Result<Arc<dyn Transport>, StateError> {
    match cfg.server_type {
        McpServerType::Stdio => Ok(Arc::new(StdioTransport::new(
            cfg.command.clone().unwrap_or_default(),
            cfg.args.clone(),
            cfg.env.clone().into_iter().collect(),
        ))),
        McpServerType::Sse => {
            let url = Url::parse(cfg.url.as_deref().unwrap_or_default()).map_err(|e| {
                StateError::InvalidUrl {
                    prefix: prefix.to_string(),
                    source: e,
                }
            })?;
            Ok(Arc::new(SseTransport::new(url, reqwest::Client::new())))
        }
        McpServerType::StreamableHttp => {
            let url = Url::parse(cfg.url.as_deref().unwrap_or_default()).map_err(|e| {
                StateError::InvalidUrl {
                    prefix: prefix.to_string(),
                    source: e,
                }
            })?;
            Ok(Arc::new(StreamableHttpTransport::new(
                url,
                reqwest::Client::new(),
            )))
        }
    }
}

/// Reuses the previous snapshot's transport for `prefix` when its
/// `MCPServerConfig` is deeply equal to the new one, per the state
/// engine's transport-reuse contract.
fn reuse_transport(
    previous: Option<&State>,
    prefix: &str,
    new_config: &MCPServerConfig,
) -> Option<Arc<dyn Transport>> {
    let previous = previous?;
    let unit = previous.unit(prefix)?;
    let old_config = unit.mcp_server_config.as_ref()?;
    if old_config == new_config {
        unit.transport.clone()
    } else {
        None
    }
}

/// Compiles a configuration snapshot into a fresh [`State`], reusing
/// unchanged transports from `previous` and scheduling background starts
/// per each server's startup policy. Returns the new state plus the join
/// handles of any spawned background work (start, start-then-stop warm-up,
/// or shutdown of a removed transport) so callers — chiefly tests — can
/// await them; production code may let them run detached.
pub fn build_state_from_config(
    config: &GatewayConfig,
    previous: Option<&State>,
) -> Result<(State, Vec<JoinHandle<()>>), StateError> {
    let mut seen_prefixes = HashSet::new();
    for router in &config.routers {
        if !seen_prefixes.insert(router.prefix.clone()) {
            return Err(StateError::DuplicatePrefix(router.prefix.clone()));
        }
    }

    let mut units = HashMap::with_capacity(config.routers.len());
    let mut background = Vec::new();

    for router in &config.routers {
        let server_config = router
            .server_name
            .as_ref()
            .and_then(|name| config.http_servers.get(name))
            .cloned();
        let mcp_server_config = router
            .mcp_server_name
            .as_ref()
            .and_then(|name| config.mcp_servers.get(name))
            .cloned();
        let proto_type = resolve_proto_type(mcp_server_config.as_ref(), server_config.as_ref());

        let tools: HashMap<String, ToolConfig> = server_config
            .as_ref()
            .map(|s| s.tools.iter().map(|t| (t.name.clone(), t.clone())).collect())
            .unwrap_or_default();
        let tool_schemas: Vec<Tool> = server_config
            .as_ref()
            .map(|s| s.tools.iter().map(build_tool_schema).collect())
            .unwrap_or_default();

        let transport = match &mcp_server_config {
            Some(cfg) => {
                let reused = reuse_transport(previous, &router.prefix, cfg);
                let was_reused = reused.is_some();
                let transport = match reused {
                    Some(t) => t,
                    None => build_transport(&router.prefix, cfg)?,
                };
                if !was_reused {
                    schedule_startup(&transport, cfg, &mut background);
                }
                Some(transport)
            }
            None => None,
        };

        units.insert(
            router.prefix.clone(),
            Arc::new(RuntimeUnit {
                prefix: router.prefix.clone(),
                proto_type,
                router: router.clone(),
                server_config,
                mcp_server_config,
                tools,
                tool_schemas,
                transport,
            }),
        );
    }

    if let Some(previous) = previous {
        for prefix in previous.prefixes() {
            let still_reused = units
                .get(prefix)
                .and_then(|u| u.transport.as_ref())
                .zip(previous.unit(prefix).and_then(|u| u.transport.as_ref()))
                .is_some_and(|(new_t, old_t)| Arc::ptr_eq(new_t, old_t));
            if !still_reused {
                if let Some(old_transport) = previous.unit(prefix).and_then(|u| u.transport.clone()) {
                    background.push(tokio::spawn(async move {
                        let _ = tokio::time::timeout(TRANSPORT_STOP_TIMEOUT, old_transport.stop()).await;
                    }));
                }
            }
        }
    }

    Ok((State { units }, background))
}

fn schedule_startup(
    transport: &Arc<dyn Transport>,
    cfg: &MCPServerConfig,
    background: &mut Vec<JoinHandle<()>>,
) {
    match cfg.policy {
        StartupPolicy::OnStart => {
            let transport = transport.clone();
            background.push(tokio::spawn(async move {
                if let Err(e) = transport.start().await {
                    tracing::warn!("background transport start failed: {e}");
                }
            }));
        }
        StartupPolicy::OnDemand if cfg.preinstalled => {
            let transport = transport.clone();
            background.push(tokio::spawn(async move {
                if let Err(e) = transport.start().await {
                    tracing::warn!("preinstall warm-up start failed: {e}");
                    return;
                }
                if let Err(e) = transport.stop().await {
                    tracing::warn!("preinstall warm-up stop failed: {e}");
                }
            }));
        }
        StartupPolicy::OnDemand => {}
    }
}

/// Wraps the atomically-published state pointer: readers `load` a snapshot
/// and hold it for the life of their request, writers `reload` a whole new
/// snapshot in one swap.
pub struct StateEngine {
    current: ArcSwap<State>,
}

impl StateEngine {
    pub fn new(initial: State) -> Self {
        Self {
            current: ArcSwap::new(Arc::new(initial)),
        }
    }

    pub fn load(&self) -> Arc<State> {
        self.current.load_full()
    }

    pub fn reload(&self, config: &GatewayConfig) -> Result<Vec<JoinHandle<()>>, StateError> {
        let previous = self.current.load_full();
        let (new_state, background) = build_state_from_config(config, Some(&previous))?;
        self.current.store(Arc::new(new_state));
        Ok(background)
    }
}

