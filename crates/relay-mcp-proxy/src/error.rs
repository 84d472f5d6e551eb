#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("upstream transport is not running")]
    NotRunning,
    #[error("failed to start upstream process: {0}")]
    Spawn(String),
    #[error("upstream io error: {0}")]
    Io(String),
    #[error("upstream http error: {0}")]
    Http(String),
    #[error("upstream returned a malformed response: {0}")]
    Protocol(String),
    #[error("upstream call timed out")]
    Timeout,
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.to_string())
    }
}
