use serde::{Deserialize, Serialize};

use crate::request::RequestParams;
use crate::types::JsonRpcVersion;

/// A JSON-RPC notification: a request with no `id`, sent fire-and-forget.
/// The gateway only ever receives these (`notifications/initialized`), it
/// never sends one of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: String, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method,
            params,
        }
    }

    pub fn new_no_params(method: String) -> Self {
        Self::new(method, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::from_str;

    #[test]
    fn notification_has_no_id_field() {
        let notification = JsonRpcNotification::new_no_params("notifications/initialized".to_string());
        let json_str = serde_json::to_string(&notification).unwrap();

        assert!(!json_str.contains("\"id\""));
        assert!(json_str.contains("\"jsonrpc\":\"2.0\""));
    }

    #[test]
    fn notification_deserializes_from_the_wire() {
        let notification: JsonRpcNotification =
            from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert_eq!(notification.method, "notifications/initialized");
        assert!(notification.params.is_none());
    }
}
