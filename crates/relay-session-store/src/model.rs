use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Which front end accepted this session's inbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Sse,
    Streamable,
}

/// Headers/query/cookies captured at connect time, so later tool calls can
/// template against the request that opened the session even though the
/// triggering `tools/call` may arrive on a different HTTP request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestInfo {
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub created_at: u64,
    pub prefix: String,
    pub kind: SessionKind,
    pub request_info: RequestInfo,
}

impl SessionMeta {
    pub fn new(id: impl Into<String>, prefix: impl Into<String>, kind: SessionKind) -> Self {
        Self {
            id: id.into(),
            created_at: now_millis(),
            prefix: prefix.into(),
            kind,
            request_info: RequestInfo::default(),
        }
    }

    pub fn with_request_info(mut self, request_info: RequestInfo) -> Self {
        self.request_info = request_info;
        self
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A unit to deliver to a session's writer loop: an SSE event name plus an
/// opaque payload, normally a serialized JSON-RPC envelope.
#[derive(Debug, Clone)]
pub struct Message {
    pub event: String,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(event: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    pub fn json(event: impl Into<String>, value: &serde_json::Value) -> Self {
        Self::new(event, serde_json::to_vec(value).unwrap_or_default())
    }
}
