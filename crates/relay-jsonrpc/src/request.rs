use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::types::{JsonRpcVersion, RequestId};

/// A request's `params` member: named (the shape every method this gateway
/// forwards actually uses) or positional, per JSON-RPC 2.0 §4.2 — kept
/// untagged so a client sending either shape still deserializes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl RequestParams {
    /// Flattens back to a plain JSON value, the shape handlers deserialize
    /// their typed request structs from.
    pub fn to_value(&self) -> Value {
        match self {
            RequestParams::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            RequestParams::Array(arr) => Value::Array(arr.clone()),
        }
    }
}

/// A JSON-RPC request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: String, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            method,
            params,
        }
    }

    pub fn new_no_params(id: RequestId, method: String) -> Self {
        Self::new(id, method, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_string};

    #[test]
    fn request_with_no_params_round_trips() {
        let request =
            JsonRpcRequest::new_no_params(RequestId::Number(1), "test_method".to_string());

        let json = to_string(&request).unwrap();
        let parsed: JsonRpcRequest = from_str(&json).unwrap();

        assert_eq!(parsed.id, RequestId::Number(1));
        assert_eq!(parsed.method, "test_method");
        assert!(parsed.params.is_none());
    }

    #[test]
    fn object_params_flatten_to_the_same_value() {
        let mut params = HashMap::new();
        params.insert("name".to_string(), json!("test"));
        let request = JsonRpcRequest::new(
            RequestId::String("req1".to_string()),
            "tools/call".to_string(),
            Some(RequestParams::Object(params)),
        );

        assert_eq!(request.params.unwrap().to_value(), json!({"name": "test"}));
    }

    #[test]
    fn array_params_deserialize_from_the_wire() {
        let request: JsonRpcRequest =
            from_str(r#"{"jsonrpc":"2.0","id":2,"method":"process","params":["a",1]}"#).unwrap();
        assert!(matches!(request.params, Some(RequestParams::Array(_))));
    }
}
