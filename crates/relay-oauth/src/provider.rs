//! The capability this crate delegates to. Only the shapes the gateway's
//! own endpoints need to move data through are modeled here — grant types,
//! PKCE, consent UI, and persistence are the injected provider's concern,
//! not this crate's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OAuthError;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeRedirect {
    pub redirect_uri: String,
    pub code: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub code_verifier: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientRegistrationRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientRegistrationResponse {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevokeRequest {
    pub token: String,
    pub token_type_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub registration_endpoint: String,
    pub revocation_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
}

/// Everything the gateway's OAuth endpoints hand off to. The gateway never
/// issues or validates a token itself — it calls through this trait and
/// relays the provider's answer.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Renders the `GET /authorize` consent page. The gateway treats this
    /// as opaque HTML it passes straight through.
    async fn authorize_page(&self, request: &AuthorizeRequest) -> Result<String, OAuthError>;

    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeRedirect, OAuthError>;

    async fn token(&self, request: TokenRequest) -> Result<TokenResponse, OAuthError>;

    async fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuthError>;

    async fn revoke(&self, request: RevokeRequest) -> Result<(), OAuthError>;

    fn metadata(&self) -> AuthorizationServerMetadata;
}
