use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use relay_jsonrpc::request::{JsonRpcRequest, RequestParams};
use relay_jsonrpc::response::{JsonRpcMessage, ResponseResult};
use relay_protocol::tools::{CallToolResult, ListToolsResult, Tool};
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use url::Url;

use crate::error::TransportError;
use crate::pending::PendingRequests;
use crate::transport::{initialize_params, Transport};

const CALL_TIMEOUT: Duration = Duration::from_secs(30);
const ENDPOINT_TIMEOUT: Duration = Duration::from_secs(10);

enum State {
    Stopped,
    Running { endpoint: Url, reader: JoinHandle<()> },
}

/// Upstream MCP server speaking the original HTTP+SSE transport (protocol
/// version 2024-11-05): a GET to the SSE endpoint opens a one-way event
/// stream whose first frame names the URL to POST JSON-RPC requests to;
/// every response, success or error, arrives asynchronously as a `message`
/// event on that same stream rather than in the POST's own body.
pub struct SseTransport {
    sse_url: Url,
    http: reqwest::Client,
    state: Mutex<State>,
    is_running: AtomicBool,
    pending: Arc<PendingRequests>,
}

impl SseTransport {
    pub fn new(sse_url: Url, http: reqwest::Client) -> Self {
        Self {
            sse_url,
            http,
            state: Mutex::new(State::Stopped),
            is_running: AtomicBool::new(false),
            pending: PendingRequests::new(),
        }
    }

    async fn call(&self, method: &str, params: Option<RequestParams>) -> Result<Value, TransportError> {
        let id = self.pending.next_request_id();
        let request = JsonRpcRequest::new(id.clone(), method.to_string(), params);

        let endpoint = match &*self.state.lock().await {
            State::Running { endpoint, .. } => endpoint.clone(),
            State::Stopped => return Err(TransportError::NotRunning),
        };

        let rx = self.pending.register(id.clone()).await;
        let response = match self.http.post(endpoint).json(&request).send().await {
            Ok(r) => r,
            Err(e) => {
                self.pending.forget(&id).await;
                return Err(e.into());
            }
        };
        if !response.status().is_success() {
            self.pending.forget(&id).await;
            return Err(TransportError::Http(format!(
                "sse post rejected with status {}",
                response.status()
            )));
        }

        let message = tokio::time::timeout(CALL_TIMEOUT, rx)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|_| {
                TransportError::Protocol("sse stream closed before responding".to_string())
            })?;

        match message {
            JsonRpcMessage::Response(resp) => match resp.result {
                ResponseResult::Success(v) => Ok(v),
                ResponseResult::Null => Ok(Value::Null),
            },
            JsonRpcMessage::Error(err) => Err(TransportError::Protocol(err.error.message)),
        }
    }
}

/// Splits one `\n\n`-terminated SSE frame into its event name and joined
/// data lines. Comment lines (leading `:`) and any other field are ignored;
/// the gateway only needs `event`/`data` for this upstream direction.
fn parse_sse_frame(raw: &str) -> (Option<String>, String) {
    let mut event = None;
    let mut data_lines = Vec::new();
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
    }
    (event, data_lines.join("\n"))
}

#[async_trait]
impl Transport for SseTransport {
    async fn start(&self) -> Result<(), TransportError> {
        let mut guard = self.state.lock().await;
        if matches!(*guard, State::Running { .. }) {
            return Ok(());
        }

        let response = self
            .http
            .get(self.sse_url.clone())
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TransportError::Http(format!(
                "sse connect rejected with status {}",
                response.status()
            )));
        }

        let mut stream = response.bytes_stream();
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let pending = self.pending.clone();
        let base = self.sse_url.clone();

        let reader = tokio::spawn(async move {
            let mut buf = String::new();
            let mut endpoint_tx = Some(endpoint_tx);
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!("sse transport: stream error: {e}");
                        break;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buf.find("\n\n") {
                    let raw_frame: String = buf.drain(..pos + 2).collect();
                    let (event_name, data) = parse_sse_frame(&raw_frame);
                    match event_name.as_deref() {
                        Some("endpoint") => {
                            if let Some(tx) = endpoint_tx.take() {
                                let resolved = base.join(&data).unwrap_or_else(|_| base.clone());
                                let _ = tx.send(resolved);
                            }
                        }
                        _ if !data.is_empty() => {
                            if let Ok(message) = serde_json::from_str::<JsonRpcMessage>(&data) {
                                pending.resolve(message).await;
                            }
                        }
                        _ => {}
                    }
                }
            }
            pending.fail_all().await;
        });

        let endpoint = tokio::time::timeout(ENDPOINT_TIMEOUT, endpoint_rx)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|_| {
                TransportError::Protocol("sse stream closed before an endpoint event".to_string())
            })?;

        *guard = State::Running { endpoint, reader };
        self.is_running.store(true, Ordering::Release);
        drop(guard);

        if let Err(e) = self.call("initialize", initialize_params()).await {
            self.stop().await.ok();
            return Err(TransportError::Protocol(format!("failed to initialize: {e}")));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let mut guard = self.state.lock().await;
        let previous = std::mem::replace(&mut *guard, State::Stopped);
        self.is_running.store(false, Ordering::Release);
        match previous {
            State::Running { reader, .. } => {
                reader.abort();
                self.pending.fail_all().await;
                Ok(())
            }
            State::Stopped => Ok(()),
        }
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    async fn fetch_tools(&self) -> Result<Vec<Tool>, TransportError> {
        let value = self.call("tools/list", None).await?;
        let result: ListToolsResult =
            serde_json::from_value(value).map_err(|e| TransportError::Protocol(e.to_string()))?;
        Ok(result.tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, TransportError> {
        let mut params = HashMap::new();
        params.insert("name".to_string(), Value::String(name.to_string()));
        params.insert("arguments".to_string(), arguments);
        let value = self
            .call("tools/call", Some(RequestParams::Object(params)))
            .await?;
        serde_json::from_value(value).map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_endpoint_frame() {
        let (event, data) = parse_sse_frame("event: endpoint\ndata: /message?sessionId=abc\n\n");
        assert_eq!(event.as_deref(), Some("endpoint"));
        assert_eq!(data, "/message?sessionId=abc");
    }

    #[test]
    fn parses_message_frame_without_event_name() {
        let (event, data) = parse_sse_frame("data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":null}\n\n");
        assert_eq!(event, None);
        assert_eq!(data, "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":null}");
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let transport = SseTransport::new(
            Url::parse("http://127.0.0.1:1/sse").unwrap(),
            reqwest::Client::new(),
        );
        transport.stop().await.unwrap();
        assert!(!transport.is_running());
    }
}
