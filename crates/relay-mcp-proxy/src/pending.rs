use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use relay_jsonrpc::response::JsonRpcMessage;
use relay_jsonrpc::types::RequestId;
use tokio::sync::{oneshot, Mutex};

/// Tracks requests a long-lived transport has sent upstream but not yet
/// gotten a matching response for, keyed by the id we assigned. A reader
/// task resolves entries as responses arrive off the wire; `call` below
/// times out and drops its own entry if nothing ever comes back.
pub struct PendingRequests {
    next_id: AtomicI64,
    inflight: Mutex<HashMap<RequestId, oneshot::Sender<JsonRpcMessage>>>,
}

impl PendingRequests {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(1),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    pub fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn register(&self, id: RequestId) -> oneshot::Receiver<JsonRpcMessage> {
        let (tx, rx) = oneshot::channel();
        self.inflight.lock().await.insert(id, tx);
        rx
    }

    pub async fn forget(&self, id: &RequestId) {
        self.inflight.lock().await.remove(id);
    }

    /// Routes an incoming message to the waiter registered under its id.
    /// Returns false if nothing was waiting (stray or late response).
    pub async fn resolve(&self, message: JsonRpcMessage) -> bool {
        let Some(id) = message.id().cloned() else {
            return false;
        };
        match self.inflight.lock().await.remove(&id) {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    /// Wakes every outstanding waiter with a synthetic connection-closed
    /// error so in-flight `call`s fail fast instead of hanging until their
    /// own timeout when the transport goes down underneath them.
    pub async fn fail_all(&self) {
        let mut inflight = self.inflight.lock().await;
        for (id, tx) in inflight.drain() {
            let object = relay_jsonrpc::error::JsonRpcErrorObject::server_error(
                relay_jsonrpc::error_codes::CONNECTION_CLOSED,
                "upstream transport closed",
                None,
            );
            let _ = tx.send(JsonRpcMessage::error(
                relay_jsonrpc::error::JsonRpcError::new(Some(id), object),
            ));
        }
    }
}
