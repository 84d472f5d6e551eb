#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("duplicate prefix in configuration: {0}")]
    DuplicatePrefix(String),
    #[error("invalid mcp server url for prefix {prefix}: {source}")]
    InvalidUrl {
        prefix: String,
        #[source]
        source: url::ParseError,
    },
}
