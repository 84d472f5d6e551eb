//! Ties the six phases together: resolve, template, prepare, guard,
//! execute, respond. Every failure past resolution is represented as a
//! tool-execution error (`CallToolResult::error`), never a JSON-RPC error.

use std::collections::HashMap;

use relay_egress_acl::EgressAllowList;
use relay_protocol::tools::{CallToolParams, CallToolResult};
use relay_state::{ProxyConfig, ProxyKind, State};
use serde_json::Value;

use crate::context::{resolve_args, TemplateContext};
use crate::helpers::TemplateEngine;
use crate::{request, response};

pub struct ToolPipeline {
    client: reqwest::Client,
    engine: TemplateEngine,
    allow_list: EgressAllowList,
}

impl ToolPipeline {
    pub fn new(client: reqwest::Client, allow_list: EgressAllowList) -> Self {
        Self {
            client,
            engine: TemplateEngine::new(),
            allow_list,
        }
    }

    /// `request_value` carries the merged request-side context (headers,
    /// query, cookies, path params, body) the template context needs;
    /// callers assemble it from the inbound transport before invoking the
    /// pipeline.
    pub async fn call(
        &self,
        state: &State,
        prefix: &str,
        params: &CallToolParams,
        request_value: Value,
    ) -> CallToolResult {
        let Some(tool) = state.get_tool(prefix, &params.name) else {
            return CallToolResult::error(format!(
                "unknown tool {} for prefix {prefix}",
                params.name
            ));
        };

        let empty_config = HashMap::new();
        let config = state
            .get_server_config(prefix)
            .map(|s| &s.config)
            .unwrap_or(&empty_config);

        let args = resolve_args(tool, &params.arguments);
        let context = TemplateContext::new(args, config, request_value);

        let client = match &tool.proxy {
            Some(proxy) => proxied_client(proxy).unwrap_or_else(|_| self.client.clone()),
            None => self.client.clone(),
        };

        match request::execute(&client, tool, &self.engine, &context, &self.allow_list).await {
            Ok(response) => response::handle_response(response, tool, &self.engine, context)
                .await
                .unwrap_or_else(|e| e.into_tool_result()),
            Err(e) => e.into_tool_result(),
        }
    }
}

fn proxied_client(proxy: &ProxyConfig) -> reqwest::Result<reqwest::Client> {
    let proxy_url = match proxy.kind {
        ProxyKind::Http => proxy.url.clone(),
        ProxyKind::Socks5 => proxy.url.clone(),
    };
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::all(proxy_url)?)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_state::{ArgPosition, GatewayConfig, HttpServerConfig, RouterEntry, ToolArg, ToolConfig};

    fn state_with_echo_tool(endpoint: &str) -> State {
        let mut config = GatewayConfig::default();
        config.http_servers.insert(
            "s1".to_string(),
            HttpServerConfig {
                name: "s1".to_string(),
                tools: vec![ToolConfig {
                    name: "echo".to_string(),
                    method: "GET".to_string(),
                    endpoint: endpoint.to_string(),
                    headers: HashMap::new(),
                    args: vec![ToolArg {
                        name: "text".to_string(),
                        position: ArgPosition::Query,
                        arg_type: "string".to_string(),
                        required: true,
                        default: None,
                        description: None,
                    }],
                    request_body: None,
                    response_body: Some("{{response.body}}".to_string()),
                    proxy: None,
                    description: None,
                }],
                config: HashMap::new(),
            },
        );
        config.routers.push(RouterEntry {
            prefix: "/x".to_string(),
            server_name: Some("s1".to_string()),
            mcp_server_name: None,
            cors: None,
            auth: None,
            sse_prefix: None,
        });
        relay_state::build_state_from_config(&config, None).unwrap().0
    }

    #[tokio::test]
    async fn unknown_tool_is_a_tool_execution_error_not_a_panic() {
        let state = state_with_echo_tool("http://127.0.0.1:9/echo");
        let pipeline = ToolPipeline::new(reqwest::Client::new(), EgressAllowList::default());
        let params = CallToolParams {
            name: "missing".to_string(),
            arguments: Value::Null,
        };
        let result = pipeline.call(&state, "/x", &params, Value::Null).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn internal_endpoint_without_allow_list_entry_is_denied() {
        let state = state_with_echo_tool("http://127.0.0.1:9/echo");
        let pipeline = ToolPipeline::new(reqwest::Client::new(), EgressAllowList::default());
        let params = CallToolParams {
            name: "echo".to_string(),
            arguments: serde_json::json!({"text": "hi"}),
        };
        let result = pipeline.call(&state, "/x", &params, Value::Null).await;
        assert!(result.is_error);
    }
}
