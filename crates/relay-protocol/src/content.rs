//! Tagged content blocks carried in `CallToolResult` and prompt/resource payloads.
//!
//! The wire format uses a `type` discriminant (`text` | `image` | `audio` |
//! `resource`) rather than structural polymorphism, so a single enum with
//! `#[serde(tag = "type")]` models it directly instead of a trait object.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::meta::Annotations;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResourceContents {
    pub uri: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobResourceContents {
    pub uri: String,
    pub blob: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    Text(TextResourceContents),
    Blob(BlobResourceContents),
}

/// A tagged content item. Every MCP result (`tools/call`, prompts, sampling)
/// returns a list of these instead of one shape per content kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentBlock {
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
        #[serde(skip_serializing_if = "Option::is_none", rename = "_meta")]
        meta: Option<HashMap<String, Value>>,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        data: String,
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
        #[serde(skip_serializing_if = "Option::is_none", rename = "_meta")]
        meta: Option<HashMap<String, Value>>,
    },
    #[serde(rename_all = "camelCase")]
    Audio {
        data: String,
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
        #[serde(skip_serializing_if = "Option::is_none", rename = "_meta")]
        meta: Option<HashMap<String, Value>>,
    },
    #[serde(rename_all = "camelCase")]
    Resource {
        resource: ResourceContents,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
        #[serde(skip_serializing_if = "Option::is_none", rename = "_meta")]
        meta: Option<HashMap<String, Value>>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: text.into(),
            annotations: None,
            meta: None,
        }
    }

    pub fn error_text(text: impl Into<String>) -> Self {
        Self::text(text)
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentBlock::Image {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
            meta: None,
        }
    }

    pub fn audio(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentBlock::Audio {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
            meta: None,
        }
    }

    /// Best-effort conversion of an upstream MCP content item (arbitrary
    /// JSON) into our tagged type. Unknown shapes fall back to their raw
    /// JSON rendered as text, per the "three known shapes" rule: text,
    /// image, audio are recognized by `type`; anything else is stringified.
    pub fn from_upstream_json(value: &Value) -> Option<ContentBlock> {
        if value.is_null() {
            return None;
        }
        match value.get("type").and_then(Value::as_str) {
            Some("text") => Some(ContentBlock::text(
                value.get("text").and_then(Value::as_str).unwrap_or_default(),
            )),
            Some("image") => Some(ContentBlock::image(
                value.get("data").and_then(Value::as_str).unwrap_or_default(),
                value
                    .get("mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or("application/octet-stream"),
            )),
            Some("audio") => Some(ContentBlock::audio(
                value.get("data").and_then(Value::as_str).unwrap_or_default(),
                value
                    .get("mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or("application/octet-stream"),
            )),
            _ => Some(ContentBlock::text(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_block_round_trips() {
        let block = ContentBlock::text("hello");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hello");
        assert!(json.get("annotations").is_none());
    }

    #[test]
    fn upstream_json_recognizes_known_shapes() {
        let img = serde_json::json!({"type": "image", "data": "xx", "mimeType": "image/png"});
        match ContentBlock::from_upstream_json(&img).unwrap() {
            ContentBlock::Image { mime_type, .. } => assert_eq!(mime_type, "image/png"),
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn upstream_json_falls_back_to_text_for_unknown_shape() {
        let weird = serde_json::json!({"type": "widget", "value": 1});
        match ContentBlock::from_upstream_json(&weird).unwrap() {
            ContentBlock::Text { text, .. } => assert!(text.contains("widget")),
            other => panic!("expected text fallback, got {other:?}"),
        }
    }

    #[test]
    fn null_upstream_item_is_dropped() {
        assert!(ContentBlock::from_upstream_json(&Value::Null).is_none());
    }
}
