#[derive(Debug, thiserror::Error)]
pub enum FrontError {
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
