#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid client: {0}")]
    InvalidClient(String),

    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("provider error: {0}")]
    Internal(String),
}

impl OAuthError {
    /// The `error` field the OAuth2 spec requires on a `POST /token`
    /// failure body (RFC 6749 §5.2).
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidClient(_) => "invalid_client",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::Internal(_) => "server_error",
        }
    }

    pub fn http_status(&self) -> hyper::StatusCode {
        match self {
            OAuthError::Internal(_) => hyper::StatusCode::INTERNAL_SERVER_ERROR,
            _ => hyper::StatusCode::BAD_REQUEST,
        }
    }
}
