use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::JsonRpcError,
    request::{JsonRpcRequest, RequestParams},
    response::{JsonRpcMessage, ResponseResult},
};

/// Per-request session context threaded through to handlers.
///
/// Carries only what a handler needs to resolve a runtime unit and bind a
/// session; it has no notion of transport (SSE vs streamable) so the same
/// handler serves both front ends.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub prefix: String,
    pub metadata: HashMap<String, Value>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            prefix: prefix.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Trait for errors that can be rendered as a JSON-RPC error object.
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    fn to_error_object(&self) -> crate::error::JsonRpcErrorObject;
}

/// A single JSON-RPC method handler.
///
/// Handlers return domain errors; the dispatcher owns translating them into
/// wire-level JSON-RPC error objects via [`ToJsonRpcError`].
#[async_trait]
pub trait JsonRpcHandler: Send + Sync {
    type Error: ToJsonRpcError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session: SessionContext,
    ) -> Result<Value, Self::Error>;

    /// Handle a notification (no response expected). Default: ignore.
    async fn handle_notification(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session: SessionContext,
    ) -> Result<(), Self::Error> {
        let _ = (method, params, session);
        Ok(())
    }
}

/// Routes JSON-RPC requests to registered method handlers.
///
/// Unlike a general-purpose RPC framework, the gateway's method table is
/// fixed at construction (`initialize`, `tools/list`, `tools/call`, ...); the
/// dispatcher still goes through a handler map so each method's logic lives
/// in its own small handler rather than one large match.
pub struct JsonRpcDispatcher<E: ToJsonRpcError> {
    handlers: HashMap<&'static str, Arc<dyn JsonRpcHandler<Error = E>>>,
}

impl<E: ToJsonRpcError> JsonRpcDispatcher<E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<H>(&mut self, method: &'static str, handler: H) -> &mut Self
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.handlers.insert(method, Arc::new(handler));
        self
    }

    pub async fn dispatch(&self, request: JsonRpcRequest, session: SessionContext) -> JsonRpcMessage {
        match self.handlers.get(request.method.as_str()) {
            Some(handler) => match handler.handle(&request.method, request.params, session).await {
                Ok(result) => JsonRpcMessage::success(request.id, ResponseResult::Success(result)),
                Err(domain_error) => {
                    let error_object = domain_error.to_error_object();
                    JsonRpcMessage::error(JsonRpcError::new(Some(request.id), error_object))
                }
            },
            None => JsonRpcMessage::error(JsonRpcError::method_not_found(
                request.id,
                &request.method,
            )),
        }
    }

    pub async fn dispatch_notification(&self, method: &str, params: Option<RequestParams>, session: SessionContext) {
        if let Some(handler) = self.handlers.get(method) {
            if let Err(err) = handler.handle_notification(method, params, session).await {
                tracing::warn!(method, error = %err, "notification handler returned an error");
            }
        }
    }

    pub fn supported_methods(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

impl<E: ToJsonRpcError> Default for JsonRpcDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;
    use serde_json::json;

    #[derive(thiserror::Error, Debug)]
    enum TestError {
        #[error("boom")]
        Boom,
    }

    impl ToJsonRpcError for TestError {
        fn to_error_object(&self) -> crate::error::JsonRpcErrorObject {
            crate::error::JsonRpcErrorObject::internal_error(Some("boom".into()))
        }
    }

    struct Echo;

    #[async_trait]
    impl JsonRpcHandler for Echo {
        type Error = TestError;

        async fn handle(
            &self,
            _method: &str,
            _params: Option<RequestParams>,
            _session: SessionContext,
        ) -> Result<Value, Self::Error> {
            Ok(json!({"ok": true}))
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.register("echo", Echo);

        let request = JsonRpcRequest::new_no_params(RequestId::Number(1), "echo".to_string());
        let response = dispatcher
            .dispatch(request, SessionContext::new("s1", "/x"))
            .await;

        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let dispatcher: JsonRpcDispatcher<TestError> = JsonRpcDispatcher::new();
        let request = JsonRpcRequest::new_no_params(RequestId::Number(1), "nope".to_string());
        let response = dispatcher
            .dispatch(request, SessionContext::new("s1", "/x"))
            .await;

        assert!(response.is_error());
    }
}
