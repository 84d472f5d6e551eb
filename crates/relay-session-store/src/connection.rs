use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::model::{Message, SessionMeta};
use crate::pubsub::PubSub;

/// The gateway's per-session outbound bound: a full queue is surfaced to the
/// caller as an error rather than applying back-pressure, so a slow SSE
/// reader can never stall the dispatcher.
pub const QUEUE_CAPACITY: usize = 100;

/// Where a `Connection`'s outbound messages actually go.
///
/// `Local` is the plain in-memory case: send pushes straight into a bounded
/// channel this process drains. `Remote` is what [`SharedStore`] hands back
/// for a session whose writer loop lives on a sibling instance: send
/// publishes onto the shared topic instead, and the sibling's subscriber
/// forwards it into its own local queue.
enum Sink {
    Local {
        sender: mpsc::Sender<Message>,
        receiver: Mutex<Option<mpsc::Receiver<Message>>>,
    },
    Remote {
        bus: Arc<dyn PubSub>,
    },
}

/// One live session's delivery channel. Exactly one writer loop owns the
/// receiving half (taken via `take_event_queue`); `send` is the only path
/// producers use, so there is never more than one writer per session.
pub struct Connection {
    meta: SessionMeta,
    sink: Sink,
    closed: AtomicBool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("meta", &self.meta)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Connection {
    pub(crate) fn local(meta: SessionMeta) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            meta,
            sink: Sink::Local {
                sender,
                receiver: Mutex::new(Some(receiver)),
            },
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn remote(meta: SessionMeta, bus: Arc<dyn PubSub>) -> Self {
        Self {
            meta,
            sink: Sink::Remote { bus },
            closed: AtomicBool::new(false),
        }
    }

    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Non-blocking publish. A full local queue, a closed session, or a
    /// failed remote publish all surface as an error so the dispatcher can
    /// convert the drop into a JSON-RPC error instead of blocking.
    pub fn send(&self, message: Message) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::NotFound(self.meta.id.clone()));
        }
        match &self.sink {
            Sink::Local { sender, .. } => sender
                .try_send(message)
                .map_err(|_| SessionError::QueueFull(self.meta.id.clone())),
            Sink::Remote { bus } => bus
                .publish_event(&self.meta.id, &message)
                .map_err(|e| SessionError::PublishFailed(e.to_string())),
        }
    }

    /// Takes ownership of the local receiving half, if any. A remote
    /// connection facade never has one: its session's writer loop runs on a
    /// sibling instance.
    pub fn take_event_queue(&self) -> Option<mpsc::Receiver<Message>> {
        match &self.sink {
            Sink::Local { receiver, .. } => receiver.lock().unwrap().take(),
            Sink::Remote { .. } => None,
        }
    }

    /// Deliver a message into the local queue directly, bypassing the sink.
    /// Used by a shared store's subscriber loop to forward a record that
    /// arrived over the bus into this instance's own local connection.
    pub(crate) fn deliver_local(&self, message: Message) -> Result<(), SessionError> {
        match &self.sink {
            Sink::Local { sender, .. } => sender
                .try_send(message)
                .map_err(|_| SessionError::QueueFull(self.meta.id.clone())),
            Sink::Remote { .. } => Err(SessionError::PublishFailed(
                "cannot deliver locally to a remote connection facade".to_string(),
            )),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
