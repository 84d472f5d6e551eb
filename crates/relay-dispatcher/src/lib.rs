//! Registers [`GatewayHandler`] under the four methods a session speaks:
//! `initialize`, `notifications/initialized`, `tools/list`, `tools/call`.

use std::sync::Arc;

use relay_jsonrpc::JsonRpcDispatcher;
use relay_protocol::{Implementation, McpError};
use relay_state::StateEngine;
use relay_tool_pipeline::ToolPipeline;

pub mod handler;

pub use handler::GatewayHandler;

/// Builds the dispatcher the gateway's HTTP front ends hand every inbound
/// request to. `server_info` is what `initialize` reports back as
/// `serverInfo`.
pub fn build_dispatcher(
    state: Arc<StateEngine>,
    tool_pipeline: Arc<ToolPipeline>,
    server_info: Implementation,
) -> JsonRpcDispatcher<McpError> {
    let gateway_handler = GatewayHandler::new(state, tool_pipeline, server_info);
    let mut dispatcher = JsonRpcDispatcher::new();
    dispatcher.register("initialize", gateway_handler.clone());
    dispatcher.register("tools/list", gateway_handler.clone());
    dispatcher.register("tools/call", gateway_handler.clone());
    dispatcher.register("notifications/initialized", gateway_handler);
    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_egress_acl::EgressAllowList;
    use relay_jsonrpc::{JsonRpcRequest, RequestId, RequestParams, SessionContext};
    use relay_state::{build_state_from_config, GatewayConfig};
    use serde_json::json;
    use std::collections::HashMap;

    fn empty_dispatcher() -> JsonRpcDispatcher<McpError> {
        let config = GatewayConfig::default();
        let (state, _) = build_state_from_config(&config, None).unwrap();
        let state = Arc::new(StateEngine::new(state));
        let pipeline = Arc::new(ToolPipeline::new(reqwest::Client::new(), EgressAllowList::default()));
        build_dispatcher(state, pipeline, Implementation::new("relay-gateway", "0.1.0"))
    }

    #[tokio::test]
    async fn initialize_negotiates_a_known_version() {
        let dispatcher = empty_dispatcher();
        let params = RequestParams::Object({
            let mut map = HashMap::new();
            map.insert("protocolVersion".to_string(), json!("2024-11-05"));
            map.insert("capabilities".to_string(), json!({}));
            map.insert(
                "clientInfo".to_string(),
                json!({"name": "test-client", "version": "1.0"}),
            );
            map
        });
        let request = JsonRpcRequest::new(RequestId::Number(1), "initialize".to_string(), Some(params));
        let response = dispatcher
            .dispatch(request, SessionContext::new("s1", "/x"))
            .await;
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn tools_call_against_an_unrouted_prefix_is_unsupported_protocol_type() {
        let dispatcher = empty_dispatcher();
        let params = RequestParams::Object({
            let mut map = HashMap::new();
            map.insert("name".to_string(), json!("whatever"));
            map.insert("arguments".to_string(), json!({}));
            map
        });
        let request = JsonRpcRequest::new(RequestId::Number(2), "tools/call".to_string(), Some(params));
        let response = dispatcher
            .dispatch(request, SessionContext::new("s1", "/unrouted"))
            .await;
        assert!(response.is_error());
    }

    #[tokio::test]
    async fn unknown_prefix_on_tools_list_is_unsupported_protocol_type() {
        let dispatcher = empty_dispatcher();
        let request = JsonRpcRequest::new_no_params(RequestId::Number(3), "tools/list".to_string());
        let response = dispatcher
            .dispatch(request, SessionContext::new("s1", "/unrouted"))
            .await;
        assert!(response.is_error());
    }
}
