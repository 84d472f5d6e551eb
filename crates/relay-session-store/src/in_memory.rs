use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::connection::Connection;
use crate::error::SessionError;
use crate::model::SessionMeta;
use crate::store::SessionStore;

/// Single-process session registry: a reader-writer-locked map from session
/// id to its connection. Readers (lookups for delivery) never block each
/// other; only register/unregister take the write lock.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, Arc<Connection>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn register(&self, meta: SessionMeta) -> Result<Arc<Connection>, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&meta.id) {
            return Err(SessionError::AlreadyExists(meta.id));
        }
        let id = meta.id.clone();
        let conn = Arc::new(Connection::local(meta));
        sessions.insert(id, conn.clone());
        Ok(conn)
    }

    async fn get(&self, id: &str) -> Result<Arc<Connection>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .filter(|c| !c.is_closed())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn unregister(&self, id: &str) -> Result<(), SessionError> {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(conn) => {
                conn.close();
                Ok(())
            }
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    async fn list(&self) -> Vec<Arc<Connection>> {
        self.sessions.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionKind;

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let store = InMemoryStore::new();
        let meta = SessionMeta::new("s1", "/x", SessionKind::Sse);
        store.register(meta).await.unwrap();

        let conn = store.get("s1").await.unwrap();
        assert_eq!(conn.meta().id, "s1");
    }

    #[tokio::test]
    async fn register_duplicate_id_fails() {
        let store = InMemoryStore::new();
        store
            .register(SessionMeta::new("s1", "/x", SessionKind::Sse))
            .await
            .unwrap();

        let err = store
            .register(SessionMeta::new("s1", "/x", SessionKind::Sse))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::AlreadyExists("s1".to_string()));
    }

    #[tokio::test]
    async fn get_after_unregister_is_not_found() {
        let store = InMemoryStore::new();
        store
            .register(SessionMeta::new("s1", "/x", SessionKind::Sse))
            .await
            .unwrap();
        store.unregister("s1").await.unwrap();

        let err = store.get("s1").await.unwrap_err();
        assert_eq!(err, SessionError::NotFound("s1".to_string()));
    }

    #[tokio::test]
    async fn full_queue_surfaces_as_error_not_block() {
        use crate::model::Message;

        let store = InMemoryStore::new();
        let conn = store
            .register(SessionMeta::new("s1", "/x", SessionKind::Sse))
            .await
            .unwrap();

        for _ in 0..crate::connection::QUEUE_CAPACITY {
            conn.send(Message::new("message", b"x".to_vec())).unwrap();
        }
        let err = conn.send(Message::new("message", b"y".to_vec())).unwrap_err();
        assert_eq!(err, SessionError::QueueFull("s1".to_string()));
    }
}
