use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::Connection;
use crate::error::SessionError;
use crate::model::SessionMeta;

/// Owns live session lifecycle and routes outbound messages to the right
/// connection regardless of which frontend instance accepted the inbound
/// call. Two implementations exist: [`InMemoryStore`](crate::in_memory::InMemoryStore)
/// for a single process, and [`SharedStore`](crate::shared::SharedStore) for
/// a cluster fronted by several gateway instances.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn register(&self, meta: SessionMeta) -> Result<Arc<Connection>, SessionError>;
    async fn get(&self, id: &str) -> Result<Arc<Connection>, SessionError>;
    async fn unregister(&self, id: &str) -> Result<(), SessionError>;
    async fn list(&self) -> Vec<Arc<Connection>>;
}

pub type BoxedSessionStore = dyn SessionStore;
