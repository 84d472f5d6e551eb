//! Per-prefix URL surface: `GET P/sse`, `POST P/message`, `POST|GET|DELETE
//! P/mcp`, plus the global `GET /health_check`. One `route` entry point
//! picks the longest registered prefix that matches the request path and
//! dispatches on the remaining suffix.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body::Frame;
use http_body_util::BodyExt;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Response, StatusCode};
use relay_jsonrpc::{JsonRpcDispatcher, JsonRpcNotification, JsonRpcRequest, SessionContext};
use relay_protocol::McpError;
use relay_session_store::{BoxedSessionStore, Message, SessionKind, SessionMeta};
use relay_state::StateEngine;
use serde_json::Value;
use uuid::Uuid;

use crate::body::{self, FrontBody};
use crate::cors::CorsLayer;
use crate::session::{parse_query, request_info};

pub struct AppState {
    pub state: Arc<StateEngine>,
    pub dispatcher: Arc<JsonRpcDispatcher<McpError>>,
    pub sessions: Arc<BoxedSessionStore>,
}

impl AppState {
    pub fn new(state: Arc<StateEngine>, dispatcher: JsonRpcDispatcher<McpError>, sessions: Arc<BoxedSessionStore>) -> Self {
        Self {
            state,
            dispatcher: Arc::new(dispatcher),
            sessions,
        }
    }
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<FrontBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(body::full(body.into()))
        .unwrap()
}

fn json_response(status: StatusCode, value: &Value) -> Response<FrontBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(body::full(serde_json::to_vec(value).unwrap_or_default()))
        .unwrap()
}

fn accepted() -> Response<FrontBody> {
    text_response(StatusCode::ACCEPTED, "Accepted")
}

fn not_found(message: &str) -> Response<FrontBody> {
    text_response(StatusCode::NOT_FOUND, message.to_string())
}

fn preflight(allow_methods: &str) -> Response<FrontBody> {
    let mut response = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(body::full(Bytes::new()))
        .unwrap();
    CorsLayer::apply(response.headers_mut(), allow_methods);
    response
}

/// Longest prefix among the routed prefixes that the path starts with, so
/// `/a/b` is matched by a router bound to `/a/b` rather than a shorter `/a`
/// also present in the table.
fn match_prefix<'a>(path: &'a str, prefixes: &'a [String]) -> Option<(&'a str, &'a str)> {
    prefixes
        .iter()
        .filter(|p| path.starts_with(p.as_str()))
        .max_by_key(|p| p.len())
        .map(|p| (p.as_str(), &path[p.len()..]))
}

pub async fn route(
    req: Request<hyper::body::Incoming>,
    app: Arc<AppState>,
) -> Result<Response<FrontBody>, Infallible> {
    let path = req.uri().path().to_string();

    if path == "/health_check" {
        return Ok(json_response(StatusCode::OK, &serde_json::json!({"status": "ok"})));
    }

    let snapshot = app.state.load();
    let prefixes: Vec<String> = snapshot.prefixes().map(str::to_string).collect();
    let Some((prefix, suffix)) = match_prefix(&path, &prefixes) else {
        return Ok(not_found("Not Found"));
    };
    let prefix = prefix.to_string();

    let mut response = match (suffix, req.method().clone()) {
        ("/sse", Method::GET) => handle_sse(app, prefix, req).await,
        ("/sse", Method::OPTIONS) => preflight("GET, OPTIONS"),
        ("/message", Method::POST) => handle_message(app, &prefix, req).await,
        ("/message", Method::OPTIONS) => preflight("POST, OPTIONS"),
        ("/mcp", Method::POST) => handle_mcp_post(app, &prefix, req).await,
        ("/mcp", Method::DELETE) => handle_mcp_delete(app, req).await,
        ("/mcp", Method::GET) => text_response(StatusCode::METHOD_NOT_ALLOWED, "GET /mcp is not supported"),
        ("/mcp", Method::OPTIONS) => preflight("GET, POST, DELETE"),
        _ => not_found("Not Found"),
    };
    if !response.headers().contains_key("Access-Control-Allow-Origin") {
        CorsLayer::apply(response.headers_mut(), "GET, POST, DELETE, OPTIONS");
    }
    Ok(response)
}

async fn read_body(req: Request<hyper::body::Incoming>) -> Result<(hyper::HeaderMap, hyper::Uri, Bytes), Response<FrontBody>> {
    let (parts, body) = req.into_parts();
    match body.collect().await {
        Ok(collected) => Ok((parts.headers, parts.uri, collected.to_bytes())),
        Err(_) => Err(text_response(StatusCode::BAD_REQUEST, "failed to read request body")),
    }
}

async fn handle_sse(app: Arc<AppState>, prefix: String, req: Request<hyper::body::Incoming>) -> Response<FrontBody> {
    let headers = req.headers().clone();
    let uri = req.uri().clone();
    let session_id = Uuid::new_v4().to_string();
    let meta = SessionMeta::new(session_id.clone(), prefix.clone(), SessionKind::Sse)
        .with_request_info(request_info(&headers, &uri));

    let connection = match app.sessions.register(meta).await {
        Ok(c) => c,
        Err(e) => return text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let Some(mut queue) = connection.take_event_queue() else {
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, "session has no local event queue");
    };

    let endpoint_frame = format!("event: endpoint\ndata: {prefix}/message?sessionId={session_id}\n\n");
    let sessions = app.sessions.clone();
    let cleanup_session_id = session_id.clone();

    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(Frame::data(Bytes::from(endpoint_frame)));
        while let Some(message) = queue.recv().await {
            let frame = format!(
                "event: {}\ndata: {}\n\n",
                message.event,
                String::from_utf8_lossy(&message.data),
            );
            yield Ok(Frame::data(Bytes::from(frame)));
        }
        // Reached only once the store drops this session's sender, which
        // happens on an explicit unregister elsewhere; a client that just
        // disconnects without one leaves the session live until that
        // happens, same as the broadcast-based SSE manager this is grounded on.
        let _ = sessions.unregister(&cleanup_session_id).await;
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .header("Cache-Control", "no-cache")
        .body(body::streaming(stream))
        .unwrap()
}

async fn handle_message(app: Arc<AppState>, prefix: &str, req: Request<hyper::body::Incoming>) -> Response<FrontBody> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("application/json") {
        return text_response(StatusCode::BAD_REQUEST, "Content-Type must be application/json");
    }

    let (_headers, uri, body) = match read_body(req).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    let query = parse_query(&uri);
    let Some(session_id) = query.get("sessionId") else {
        return text_response(StatusCode::BAD_REQUEST, "missing sessionId query parameter");
    };

    let connection = match app.sessions.get(session_id).await {
        Ok(c) => c,
        Err(_) => return not_found("Session not found"),
    };

    let Ok(value) = serde_json::from_slice::<Value>(&body) else {
        return text_response(StatusCode::BAD_REQUEST, "invalid JSON-RPC payload");
    };

    if value.get("id").is_none() {
        let Ok(notification) = serde_json::from_value::<JsonRpcNotification>(value) else {
            return text_response(StatusCode::BAD_REQUEST, "invalid JSON-RPC notification");
        };
        app.dispatcher
            .dispatch_notification(
                &notification.method,
                notification.params,
                SessionContext::new(session_id.clone(), prefix),
            )
            .await;
        return accepted();
    }

    let Ok(request) = serde_json::from_value::<JsonRpcRequest>(value) else {
        return text_response(StatusCode::BAD_REQUEST, "invalid JSON-RPC request");
    };
    let message = app
        .dispatcher
        .dispatch(request, SessionContext::new(session_id.clone(), prefix))
        .await;
    let payload = serde_json::to_value(&message).unwrap_or(Value::Null);
    let _ = connection.send(Message::json("message", &payload));
    accepted()
}

const SESSION_HEADER: &str = "Mcp-Session-Id";

async fn handle_mcp_post(app: Arc<AppState>, prefix: &str, req: Request<hyper::body::Incoming>) -> Response<FrontBody> {
    let existing_session = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let headers_for_info = req.headers().clone();
    let uri_for_info = req.uri().clone();

    let (_, _, body) = match read_body(req).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    let Ok(value) = serde_json::from_slice::<Value>(&body) else {
        return text_response(StatusCode::BAD_REQUEST, "invalid JSON-RPC payload");
    };
    let method = value.get("method").and_then(Value::as_str).unwrap_or_default().to_string();
    let has_id = value.get("id").is_some();

    let session_id = if method == "initialize" {
        let new_id = Uuid::new_v4().to_string();
        let meta = SessionMeta::new(new_id.clone(), prefix.to_string(), SessionKind::Streamable)
            .with_request_info(request_info(&headers_for_info, &uri_for_info));
        if let Err(e) = app.sessions.register(meta).await {
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
        new_id
    } else {
        match existing_session.clone() {
            Some(id) => id,
            None => return text_response(StatusCode::BAD_REQUEST, "missing Mcp-Session-Id header"),
        }
    };

    if method != "initialize" && app.sessions.get(&session_id).await.is_err() {
        let id_value = value.get("id").cloned();
        let error_message = relay_jsonrpc::JsonRpcError::new(
            id_value.and_then(|v| serde_json::from_value(v).ok()),
            <McpError as relay_jsonrpc::ToJsonRpcError>::to_error_object(&McpError::SessionNotFound),
        );
        return streamable_frame(&session_id, &serde_json::to_value(error_message).unwrap_or(Value::Null));
    }

    if !has_id {
        let Ok(notification) = serde_json::from_value::<JsonRpcNotification>(value) else {
            return text_response(StatusCode::BAD_REQUEST, "invalid JSON-RPC notification");
        };
        app.dispatcher
            .dispatch_notification(
                &notification.method,
                notification.params,
                SessionContext::new(session_id.clone(), prefix),
            )
            .await;
        let mut response = accepted();
        response
            .headers_mut()
            .insert(SESSION_HEADER, session_id.parse().unwrap());
        return response;
    }

    let Ok(request) = serde_json::from_value::<JsonRpcRequest>(value) else {
        return text_response(StatusCode::BAD_REQUEST, "invalid JSON-RPC request");
    };
    let message = app
        .dispatcher
        .dispatch(request, SessionContext::new(session_id.clone(), prefix))
        .await;
    streamable_frame(&session_id, &serde_json::to_value(message).unwrap_or(Value::Null))
}

fn streamable_frame(session_id: &str, payload: &Value) -> Response<FrontBody> {
    let frame = format!(
        "event: message\ndata: {}\n\n",
        serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string())
    );
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .body(body::full(frame))
        .unwrap();
    response
        .headers_mut()
        .insert(SESSION_HEADER, session_id.parse().unwrap());
    response
}

async fn handle_mcp_delete(app: Arc<AppState>, req: Request<hyper::body::Incoming>) -> Response<FrontBody> {
    let Some(session_id) = req.headers().get(SESSION_HEADER).and_then(|v| v.to_str().ok()) else {
        return text_response(StatusCode::BAD_REQUEST, "missing Mcp-Session-Id header");
    };
    match app.sessions.unregister(session_id).await {
        Ok(()) => Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(body::full(Bytes::new()))
            .unwrap(),
        Err(_) => not_found("Session not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_egress_acl::EgressAllowList;
    use relay_state::{build_state_from_config, GatewayConfig, HttpServerConfig, RouterEntry};
    use relay_session_store::InMemoryStore;
    use relay_tool_pipeline::ToolPipeline;
    use std::collections::HashMap;
    use std::net::SocketAddr;

    #[test]
    fn match_prefix_picks_the_longest_candidate() {
        let prefixes = vec!["/a".to_string(), "/a/b".to_string()];
        let (prefix, suffix) = match_prefix("/a/b/sse", &prefixes).unwrap();
        assert_eq!(prefix, "/a/b");
        assert_eq!(suffix, "/sse");
    }

    #[test]
    fn match_prefix_returns_none_for_an_unrouted_path() {
        let prefixes = vec!["/a".to_string()];
        assert!(match_prefix("/z/sse", &prefixes).is_none());
    }

    fn test_app() -> Arc<AppState> {
        let mut config = GatewayConfig::default();
        config.http_servers.insert(
            "s1".to_string(),
            HttpServerConfig {
                name: "s1".to_string(),
                tools: vec![],
                config: HashMap::new(),
            },
        );
        config.routers.push(RouterEntry {
            prefix: "/x".to_string(),
            server_name: Some("s1".to_string()),
            mcp_server_name: None,
            cors: None,
            auth: None,
            sse_prefix: None,
        });
        let (state, _) = build_state_from_config(&config, None).unwrap();
        let state = Arc::new(StateEngine::new(state));
        let pipeline = Arc::new(ToolPipeline::new(reqwest::Client::new(), EgressAllowList::default()));
        let dispatcher = relay_dispatcher::build_dispatcher(
            state.clone(),
            pipeline,
            relay_protocol::Implementation::new("relay-gateway-test", "0.1.0"),
        );
        let sessions: Arc<BoxedSessionStore> = Arc::new(InMemoryStore::new());
        Arc::new(AppState::new(state, dispatcher, sessions))
    }

    #[tokio::test]
    async fn health_check_reports_ok_over_a_real_connection() {
        let app = test_app();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let app = app.clone();
                let io = hyper_util::rt::TokioIo::new(stream);
                let service = hyper::service::service_fn(move |req| {
                    let app = app.clone();
                    async move { route(req, app).await }
                });
                tokio::spawn(async move {
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        let response = reqwest::get(format!("http://{addr}/health_check")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }
}
