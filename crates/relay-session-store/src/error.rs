#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session already exists: {0}")]
    AlreadyExists(String),
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("outbound queue is full for session {0}")]
    QueueFull(String),
    #[error("failed to publish to shared session topic: {0}")]
    PublishFailed(String),
}
