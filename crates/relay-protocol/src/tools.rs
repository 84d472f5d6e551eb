//! Tool descriptors and the `tools/list` / `tools/call` payload shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::ContentBlock;

/// JSON-Schema-shaped input schema. The gateway treats this as an opaque
/// document: it forwards whatever the tool config or upstream server
/// declares without validating arguments against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ToolSchema {
    pub fn object() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Some(Value::Object(Default::default())),
            required: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: ToolSchema,
}

impl Tool {
    pub fn new(name: impl Into<String>, input_schema: ToolSchema) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// The result of invoking a tool. A tool-level failure (bad template,
/// non-2xx backend response, egress denial, ...) is represented here with
/// `is_error: true` rather than as a JSON-RPC error, since MCP clients are
/// expected to render it as part of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// `None` (serialized as absent) distinguishes "upstream said no
    /// content" from an empty list; both render as valid MCP results but
    /// we stay faithful to which one the backend actually meant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentBlock>>,
    pub is_error: bool,
}

impl CallToolResult {
    pub fn ok(content: Vec<ContentBlock>) -> Self {
        Self {
            content: Some(content),
            is_error: false,
        }
    }

    pub fn no_content() -> Self {
        Self {
            content: None,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: Some(vec![ContentBlock::error_text(message)]),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_content_serializes_without_the_field() {
        let result = CallToolResult::no_content();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("content").is_none());
    }

    #[test]
    fn error_result_is_marked_is_error() {
        let result = CallToolResult::error("denied");
        assert!(result.is_error);
        assert_eq!(result.content.unwrap().len(), 1);
    }
}
