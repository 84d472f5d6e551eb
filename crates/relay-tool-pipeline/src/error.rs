#[derive(Debug, thiserror::Error)]
pub enum ToolPipelineError {
    #[error("unknown tool {tool} for prefix {prefix}")]
    UnknownTool { prefix: String, tool: String },
    #[error("template error while rendering {field}: {source}")]
    Template {
        field: String,
        #[source]
        source: handlebars::RenderError,
    },
    #[error("{0}")]
    Egress(#[from] relay_egress_acl::EgressError),
    #[error("invalid tool endpoint url: {0}")]
    InvalidUrl(String),
    #[error("request construction failed: {0}")]
    RequestBuild(String),
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ToolPipelineError {
    /// Every phase-4-and-later failure is represented in the MCP response
    /// as a tool-execution error, never a JSON-RPC protocol error, so
    /// callers render it through this single conversion.
    pub fn into_tool_result(self) -> relay_protocol::tools::CallToolResult {
        relay_protocol::tools::CallToolResult::error(self.to_string())
    }
}
