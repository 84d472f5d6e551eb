use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{Message, SessionMeta};

/// What gets published onto the shared session topic. Every instance in the
/// cluster subscribes to the same topic and reacts to the records that
/// concern sessions it owns locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionRecord {
    Create { id: String, meta: SessionMeta },
    Update { id: String, meta: SessionMeta },
    Delete { id: String },
    Event { id: String, message: RecordMessage },
}

impl SessionRecord {
    pub fn id(&self) -> &str {
        match self {
            SessionRecord::Create { id, .. }
            | SessionRecord::Update { id, .. }
            | SessionRecord::Delete { id }
            | SessionRecord::Event { id, .. } => id,
        }
    }
}

/// `Message` isn't `Serialize` as a public type (its payload is an opaque
/// byte blob produced by callers); this is the wire shape used on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMessage {
    pub event: String,
    pub data: Vec<u8>,
}

impl From<&Message> for RecordMessage {
    fn from(m: &Message) -> Self {
        Self {
            event: m.event.clone(),
            data: m.data.clone(),
        }
    }
}

impl From<RecordMessage> for Message {
    fn from(r: RecordMessage) -> Self {
        Message::new(r.event, r.data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error("no subscribers on the shared session topic")]
    NoSubscribers,
    #[error("failed to encode session record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The shared session topic. A cluster deployment backs this with a real
/// broker (Redis pub/sub, NATS, ...); [`InProcessBus`] is the in-process
/// stand-in used for tests and for the single-binary demo topology.
pub trait PubSub: Send + Sync + fmt::Debug {
    fn publish(&self, record: SessionRecord) -> Result<(), PubSubError>;

    fn publish_event(&self, id: &str, message: &Message) -> Result<(), PubSubError> {
        self.publish(SessionRecord::Event {
            id: id.to_string(),
            message: message.into(),
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionRecord>;
}

/// Broadcast-channel-backed bus shared by every `SharedStore` handle that
/// was built from the same `InProcessBus` instance, simulating a cluster's
/// shared topic within a single process.
#[derive(Debug, Clone)]
pub struct InProcessBus {
    tx: broadcast::Sender<SessionRecord>,
}

impl InProcessBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self { tx }
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSub for InProcessBus {
    fn publish(&self, record: SessionRecord) -> Result<(), PubSubError> {
        // No subscribers is not an error: a store that hasn't spawned its
        // forwarding loop yet (or in a single-node test) simply drops it.
        let _ = self.tx.send(record);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionRecord> {
        self.tx.subscribe()
    }
}
