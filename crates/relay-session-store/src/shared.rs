use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::connection::Connection;
use crate::error::SessionError;
use crate::model::SessionMeta;
use crate::pubsub::{PubSub, SessionRecord};
use crate::store::SessionStore;

/// Default TTL applied to both the metadata entry and its index slot.
/// Refreshed on every register/get/send so an actively used session never
/// expires mid-conversation.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct IndexEntry {
    meta: SessionMeta,
    expires_at: Instant,
}

/// Cluster-aware session registry. Metadata lives in a TTL'd index that
/// every instance keeps a copy of via the shared topic; only the instance
/// whose frontend accepted a session's inbound connection holds a local
/// [`Connection`] with a live writer loop. `Send` therefore always goes
/// through the bus: either it lands on this instance's own local table, or
/// a sibling's subscriber picks it up and forwards it into its queue.
pub struct SharedStore {
    bus: Arc<dyn PubSub>,
    ttl: Duration,
    index: RwLock<HashMap<String, IndexEntry>>,
    local: RwLock<HashMap<String, Arc<Connection>>>,
    _subscriber: JoinHandle<()>,
}

impl SharedStore {
    pub fn new(bus: Arc<dyn PubSub>) -> Arc<Self> {
        Self::with_ttl(bus, DEFAULT_TTL)
    }

    pub fn with_ttl(bus: Arc<dyn PubSub>, ttl: Duration) -> Arc<Self> {
        let mut rx = bus.subscribe();
        Arc::new_cyclic(|weak: &std::sync::Weak<Self>| {
            let weak = weak.clone();
            let subscriber = tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(record) => {
                            let Some(store) = weak.upgrade() else { break };
                            store.apply_record(record).await;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
            Self {
                bus,
                ttl,
                index: RwLock::new(HashMap::new()),
                local: RwLock::new(HashMap::new()),
                _subscriber: subscriber,
            }
        })
    }

    async fn apply_record(&self, record: SessionRecord) {
        let id = record.id().to_string();
        match record {
            SessionRecord::Create { meta, .. } | SessionRecord::Update { meta, .. } => {
                self.index.write().await.insert(
                    id,
                    IndexEntry {
                        meta,
                        expires_at: Instant::now() + self.ttl,
                    },
                );
            }
            SessionRecord::Delete { .. } => {
                self.index.write().await.remove(&id);
            }
            SessionRecord::Event { message, .. } => {
                let local = self.local.read().await;
                if let Some(conn) = local.get(&id) {
                    // Best effort: a full queue here means a slow local
                    // reader, which is surfaced to its own caller via the
                    // connection handle, not to whichever sibling published.
                    let _ = conn.deliver_local(message.into());
                }
            }
        }
    }

    async fn touch(&self, id: &str) {
        if let Some(entry) = self.index.write().await.get_mut(id) {
            entry.expires_at = Instant::now() + self.ttl;
        }
    }

    fn is_expired(entry: &IndexEntry) -> bool {
        Instant::now() >= entry.expires_at
    }
}

impl Drop for SharedStore {
    fn drop(&mut self) {
        self._subscriber.abort();
    }
}

#[async_trait]
impl SessionStore for SharedStore {
    async fn register(&self, meta: SessionMeta) -> Result<Arc<Connection>, SessionError> {
        {
            let index = self.index.read().await;
            if let Some(entry) = index.get(&meta.id) {
                if !Self::is_expired(entry) {
                    return Err(SessionError::AlreadyExists(meta.id.clone()));
                }
            }
        }

        let conn = Arc::new(Connection::local(meta.clone()));
        self.local
            .write()
            .await
            .insert(meta.id.clone(), conn.clone());
        self.index.write().await.insert(
            meta.id.clone(),
            IndexEntry {
                meta: meta.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        self.bus
            .publish(SessionRecord::Create {
                id: meta.id.clone(),
                meta,
            })
            .map_err(|e| SessionError::PublishFailed(e.to_string()))?;
        Ok(conn)
    }

    async fn get(&self, id: &str) -> Result<Arc<Connection>, SessionError> {
        if let Some(conn) = self.local.read().await.get(id) {
            if !conn.is_closed() {
                self.touch(id).await;
                return Ok(conn.clone());
            }
        }

        let meta = {
            let index = self.index.read().await;
            let entry = index
                .get(id)
                .filter(|e| !Self::is_expired(e))
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            entry.meta.clone()
        };
        self.touch(id).await;
        // Owned by a sibling instance: hand back a facade whose `send`
        // publishes to the bus instead of writing to a local queue.
        Ok(Arc::new(Connection::remote(meta, self.bus.clone())))
    }

    async fn unregister(&self, id: &str) -> Result<(), SessionError> {
        let local = self.local.write().await.remove(id);
        let had_index_entry = self.index.write().await.remove(id).is_some();
        if let Some(conn) = local {
            conn.close();
        }
        if had_index_entry {
            let _ = self.bus.publish(SessionRecord::Delete { id: id.to_string() });
            Ok(())
        } else {
            Err(SessionError::NotFound(id.to_string()))
        }
    }

    async fn list(&self) -> Vec<Arc<Connection>> {
        self.local.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Message, SessionKind};
    use crate::pubsub::InProcessBus;

    fn bus() -> Arc<InProcessBus> {
        Arc::new(InProcessBus::new())
    }

    #[tokio::test]
    async fn register_then_get_locally_round_trips() {
        let store = SharedStore::new(bus());
        store
            .register(SessionMeta::new("s1", "/x", SessionKind::Sse))
            .await
            .unwrap();

        let conn = store.get("s1").await.unwrap();
        assert_eq!(conn.meta().id, "s1");
        assert!(conn.take_event_queue().is_some());
    }

    #[tokio::test]
    async fn get_on_a_sibling_instance_returns_a_remote_facade() {
        let shared_bus = bus();
        let owner = SharedStore::new(shared_bus.clone());
        let sibling = SharedStore::new(shared_bus);

        owner
            .register(SessionMeta::new("s1", "/x", SessionKind::Sse))
            .await
            .unwrap();
        // Give the sibling's subscriber task a chance to apply the create.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let conn = sibling.get("s1").await.unwrap();
        assert_eq!(conn.meta().id, "s1");
        assert!(conn.take_event_queue().is_none());
    }

    #[tokio::test]
    async fn send_through_sibling_delivers_to_owner_queue() {
        let shared_bus = bus();
        let owner = SharedStore::new(shared_bus.clone());
        let sibling = SharedStore::new(shared_bus);

        let owner_conn = owner
            .register(SessionMeta::new("s1", "/x", SessionKind::Sse))
            .await
            .unwrap();
        let mut queue = owner_conn.take_event_queue().unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let remote_conn = sibling.get("s1").await.unwrap();
        remote_conn
            .send(Message::new("message", b"hello".to_vec()))
            .unwrap();

        let delivered = tokio::time::timeout(Duration::from_millis(200), queue.recv())
            .await
            .expect("message should arrive")
            .expect("channel should stay open");
        assert_eq!(delivered.event, "message");
        assert_eq!(delivered.data, b"hello");
    }

    #[tokio::test]
    async fn unregister_removes_from_index_and_closes_local() {
        let store = SharedStore::new(bus());
        store
            .register(SessionMeta::new("s1", "/x", SessionKind::Sse))
            .await
            .unwrap();
        store.unregister("s1").await.unwrap();

        let err = store.get("s1").await.unwrap_err();
        assert_eq!(err, SessionError::NotFound("s1".to_string()));
    }
}
