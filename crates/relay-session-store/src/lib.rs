//! Session registry: tracks one [`Connection`] per live client session and
//! routes outbound messages to it regardless of delivery transport (SSE
//! push, streamable HTTP chunk). Two backends share the same
//! [`SessionStore`] trait: [`InMemoryStore`] for a single gateway process
//! and [`SharedStore`] for a cluster of instances behind a shared topic.

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod model;
pub mod pubsub;
pub mod shared;
pub mod store;

pub use connection::{Connection, QUEUE_CAPACITY};
pub use error::SessionError;
pub use in_memory::InMemoryStore;
pub use model::{Message, RequestInfo, SessionKind, SessionMeta};
pub use pubsub::{InProcessBus, PubSub, PubSubError, SessionRecord};
pub use shared::SharedStore;
pub use store::{BoxedSessionStore, SessionStore};
