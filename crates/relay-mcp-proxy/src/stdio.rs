use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_jsonrpc::request::{JsonRpcRequest, RequestParams};
use relay_jsonrpc::response::{JsonRpcMessage, ResponseResult};
use relay_protocol::tools::{CallToolResult, ListToolsResult, Tool};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::pending::PendingRequests;
use crate::transport::{initialize_params, Transport};

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

struct Running {
    child: Child,
    stdin: ChildStdin,
    reader: JoinHandle<()>,
}

/// Upstream MCP server launched as a child process, speaking newline-framed
/// JSON-RPC over its stdin/stdout. One request per line in, one response
/// per line out; stderr is forwarded to tracing rather than parsed.
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    running: Mutex<Option<Running>>,
    is_running: AtomicBool,
    pending: Arc<PendingRequests>,
}

impl StdioTransport {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        env: Vec<(String, String)>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            env,
            running: Mutex::new(None),
            is_running: AtomicBool::new(false),
            pending: PendingRequests::new(),
        }
    }

    async fn call(&self, method: &str, params: Option<RequestParams>) -> Result<Value, TransportError> {
        let id = self.pending.next_request_id();
        let request = JsonRpcRequest::new(id.clone(), method.to_string(), params);
        let mut line =
            serde_json::to_vec(&request).map_err(|e| TransportError::Protocol(e.to_string()))?;
        line.push(b'\n');

        let rx = self.pending.register(id.clone()).await;
        {
            let mut guard = self.running.lock().await;
            let running = guard.as_mut().ok_or(TransportError::NotRunning)?;
            if let Err(e) = running.stdin.write_all(&line).await {
                drop(guard);
                self.pending.forget(&id).await;
                return Err(e.into());
            }
        }

        let message = tokio::time::timeout(CALL_TIMEOUT, rx)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|_| {
                TransportError::Protocol("upstream closed before responding".to_string())
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

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&self) -> Result<(), TransportError> {
        let mut guard = self.running.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(self.env.iter().cloned())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| TransportError::Spawn(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("child has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("child has no stdout".to_string()))?;
        let stderr = child.stderr.take();

        let pending = self.pending.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<JsonRpcMessage>(trimmed) {
                            Ok(message) => {
                                if !pending.resolve(message).await {
                                    tracing::debug!("stdio transport: unmatched response");
                                }
                            }
                            Err(e) => tracing::warn!("stdio transport: malformed line: {e}"),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("stdio transport: read error: {e}");
                        break;
                    }
                }
            }
            pending.fail_all().await;
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "relay_mcp_proxy::stdio::stderr", "{line}");
                }
            });
        }

        *guard = Some(Running {
            child,
            stdin,
            reader,
        });
        self.is_running.store(true, Ordering::Release);
        drop(guard);

        if let Err(e) = self.call("initialize", initialize_params()).await {
            self.stop().await.ok();
            return Err(TransportError::Protocol(format!("failed to initialize: {e}")));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let mut guard = self.running.lock().await;
        let Some(mut running) = guard.take() else {
            return Ok(());
        };
        self.is_running.store(false, Ordering::Release);
        running.reader.abort();
        let _ = running.child.start_kill();
        self.pending.fail_all().await;
        Ok(())
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

    #[tokio::test]
    async fn calling_before_start_is_not_running() {
        let transport = StdioTransport::new("cat", vec![], vec![]);
        assert!(!transport.is_running());
        let err = transport.fetch_tools().await.unwrap_err();
        assert!(matches!(err, TransportError::NotRunning));
    }

    /// A stdio child that answers the first line it reads (the `initialize`
    /// handshake, always id 1 on a fresh transport) with a canned success
    /// response, then exits.
    fn handshaking_transport() -> StdioTransport {
        StdioTransport::new(
            "sh",
            vec![
                "-c".to_string(),
                "read line; printf '{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\\n'".to_string(),
            ],
            vec![],
        )
    }

    #[tokio::test]
    async fn double_start_is_a_no_op() {
        let transport = handshaking_transport();
        transport.start().await.unwrap();
        transport.start().await.unwrap();
        assert!(transport.is_running());
        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let transport = StdioTransport::new("cat", vec![], vec![]);
        transport.stop().await.unwrap();
        assert!(!transport.is_running());
    }

    #[tokio::test]
    async fn start_fails_when_the_child_never_speaks_mcp() {
        let transport = StdioTransport::new("echo", vec![], vec![]);
        let err = transport.start().await.unwrap_err();
        match err {
            TransportError::Protocol(msg) => assert!(msg.contains("failed to initialize")),
            other => panic!("expected a protocol error, got: {other:?}"),
        }
        assert!(!transport.is_running());
    }
}
