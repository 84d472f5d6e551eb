//! [`GatewayHandler`]: the single `JsonRpcHandler` registered under every
//! method the gateway's client-facing side understands.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use relay_jsonrpc::{JsonRpcHandler, RequestParams, SessionContext};
use relay_mcp_proxy::{Transport, TransportError};
use relay_protocol::{
    CallToolParams, Implementation, InitializeRequest, InitializeResult, ListToolsResult,
    McpError, McpVersion, ServerCapabilities,
};
use relay_state::{ProtoType, StartupPolicy, State, StateEngine};
use relay_tool_pipeline::ToolPipeline;
use serde_json::Value;

/// Dispatches the four methods a session ever sends: `initialize`,
/// `notifications/initialized`, `tools/list`, `tools/call`. One instance is
/// registered under each method name; `handle` matches on `method` rather
/// than splitting into four separate handler types, since they all close
/// over the same state/pipeline and nothing about registration requires
/// them to be distinct structs.
#[derive(Clone)]
pub struct GatewayHandler {
    state: Arc<StateEngine>,
    tool_pipeline: Arc<ToolPipeline>,
    server_info: Implementation,
}

impl GatewayHandler {
    pub fn new(state: Arc<StateEngine>, tool_pipeline: Arc<ToolPipeline>, server_info: Implementation) -> Self {
        Self {
            state,
            tool_pipeline,
            server_info,
        }
    }

    fn params_value(params: Option<RequestParams>) -> Value {
        params.map(|p| p.to_value()).unwrap_or(Value::Null)
    }

    /// Request-side context (headers/query/cookies/path params) the front
    /// end merged ahead of dispatch, carried through `SessionContext`'s
    /// open metadata map since `JsonRpcHandler::handle` has no raw-HTTP
    /// parameter of its own.
    fn request_context(session: &SessionContext) -> Value {
        session
            .metadata
            .get("request")
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Runs `op` against the upstream transport at `prefix`, starting it
    /// lazily on first use if it isn't already running. A server configured
    /// `on-demand` is stopped again once `op` returns, so it never idles
    /// between calls; an `on-start` server is left running for the next
    /// request to reuse.
    async fn with_transport<F, Fut, T>(state: &State, prefix: &str, op: F) -> Result<T, McpError>
    where
        F: FnOnce(Arc<dyn Transport>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let transport = state
            .get_transport(prefix)
            .ok_or(McpError::UnsupportedProtocolType)?;
        let policy = state.get_mcp_server_config(prefix).map(|cfg| cfg.policy);

        if !transport.is_running() {
            transport
                .start()
                .await
                .map_err(|e| McpError::Internal(e.to_string()))?;
        }

        let result = op(transport.clone()).await;

        if policy == Some(StartupPolicy::OnDemand) {
            if let Err(e) = transport.stop().await {
                tracing::warn!(prefix, error = %e, "on-demand transport stop after call failed");
            }
        }

        result.map_err(|e| McpError::Internal(e.to_string()))
    }

    async fn handle_initialize(&self, params: Option<RequestParams>) -> Result<Value, McpError> {
        let request: InitializeRequest = serde_json::from_value(Self::params_value(params))
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let negotiated = McpVersion::negotiate(&request.protocol_version);
        let result = InitializeResult {
            protocol_version: negotiated.as_str().to_string(),
            capabilities: ServerCapabilities::tools_only(),
            server_info: self.server_info.clone(),
            instructions: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }

    async fn handle_tools_list(&self, session: &SessionContext) -> Result<Value, McpError> {
        let state = self.state.load();
        let result = match state.get_proto_type(&session.prefix) {
            Some(ProtoType::Http) => {
                let tools = state
                    .get_tool_schemas(&session.prefix)
                    .map(|s| s.to_vec())
                    .unwrap_or_default();
                ListToolsResult { tools }
            }
            Some(ProtoType::Stdio | ProtoType::Sse | ProtoType::StreamableHttp) => {
                let tools = Self::with_transport(&state, &session.prefix, |transport| async move {
                    transport.fetch_tools().await
                })
                .await?;
                ListToolsResult { tools }
            }
            None => return Err(McpError::UnsupportedProtocolType),
        };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        params: Option<RequestParams>,
        session: &SessionContext,
    ) -> Result<Value, McpError> {
        let params: CallToolParams = serde_json::from_value(Self::params_value(params))
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        let state = self.state.load();
        let result = match state.get_proto_type(&session.prefix) {
            Some(ProtoType::Http) => {
                let request_value = Self::request_context(session);
                self.tool_pipeline
                    .call(&state, &session.prefix, &params, request_value)
                    .await
            }
            Some(ProtoType::Stdio | ProtoType::Sse | ProtoType::StreamableHttp) => {
                let name = params.name.clone();
                let arguments = params.arguments.clone();
                Self::with_transport(&state, &session.prefix, |transport| async move {
                    transport.call_tool(&name, arguments).await
                })
                .await?
            }
            None => return Err(McpError::UnsupportedProtocolType),
        };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

#[async_trait]
impl JsonRpcHandler for GatewayHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session: SessionContext,
    ) -> Result<Value, Self::Error> {
        match method {
            "initialize" => self.handle_initialize(params).await,
            "tools/list" => self.handle_tools_list(&session).await,
            "tools/call" => self.handle_tools_call(params, &session).await,
            other => Err(McpError::ToolNotFound(other.to_string())),
        }
    }

    async fn handle_notification(
        &self,
        method: &str,
        _params: Option<RequestParams>,
        session: SessionContext,
    ) -> Result<(), Self::Error> {
        if method == "notifications/initialized" {
            tracing::debug!(prefix = %session.prefix, session = %session.session_id, "session initialized");
        }
        Ok(())
    }
}
