//! Compiles declarative tenant configuration into an immutable routing
//! table keyed by URL prefix, and hot-swaps it atomically on reload,
//! reusing upstream transports whose configuration hasn't changed.

pub mod engine;
pub mod error;
pub mod model;

pub use engine::{build_state_from_config, State, StateEngine};
pub use error::StateError;
pub use model::{
    ArgPosition, AuthConfig, CorsConfig, GatewayConfig, HttpServerConfig, MCPServerConfig,
    McpServerType, ProtoType, ProxyConfig, ProxyKind, RouterEntry, RuntimeUnit, StartupPolicy,
    ToolArg, ToolConfig,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn http_router(prefix: &str, server: &str) -> RouterEntry {
        RouterEntry {
            prefix: prefix.to_string(),
            server_name: Some(server.to_string()),
            mcp_server_name: None,
            cors: None,
            auth: None,
            sse_prefix: None,
        }
    }

    #[test]
    fn duplicate_prefix_is_a_hard_error() {
        let mut config = GatewayConfig::default();
        config.routers.push(http_router("/x", "s1"));
        config.routers.push(http_router("/x", "s2"));

        let err = build_state_from_config(&config, None).unwrap_err();
        assert!(matches!(err, StateError::DuplicatePrefix(p) if p == "/x"));
    }

    #[test]
    fn router_without_server_is_idle_not_an_error() {
        let mut config = GatewayConfig::default();
        config.routers.push(RouterEntry {
            prefix: "/orphan".to_string(),
            server_name: Some("missing".to_string()),
            mcp_server_name: None,
            cors: None,
            auth: None,
            sse_prefix: None,
        });

        let (state, background) = build_state_from_config(&config, None).unwrap();
        assert!(background.is_empty());
        assert_eq!(state.get_proto_type("/orphan"), None);
        assert!(state.unit("/orphan").unwrap().is_idle());
    }

    #[test]
    fn http_tool_compiles_a_schema_and_is_reachable_by_name() {
        let mut config = GatewayConfig::default();
        config.http_servers.insert(
            "s1".to_string(),
            HttpServerConfig {
                name: "s1".to_string(),
                tools: vec![ToolConfig {
                    name: "echo".to_string(),
                    method: "GET".to_string(),
                    endpoint: "http://example.test/echo".to_string(),
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
                    response_body: Some("{{.Response.Body}}".to_string()),
                    proxy: None,
                    description: None,
                }],
                config: HashMap::new(),
            },
        );
        config.routers.push(http_router("/x", "s1"));

        let (state, _) = build_state_from_config(&config, None).unwrap();
        assert_eq!(state.get_proto_type("/x"), Some(ProtoType::Http));
        assert!(state.get_tool("/x", "echo").is_some());
        let schemas = state.get_tool_schemas("/x").unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
    }
}
