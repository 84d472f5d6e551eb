//! A demonstration provider good enough to exercise the gateway's OAuth
//! surface end to end without a real identity provider wired in: clients
//! register in memory, authorization codes are single-use and short-lived,
//! and access tokens are signed JWTs validated against the same secret
//! that issued them.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OAuthError;
use crate::provider::{
    AuthorizationServerMetadata, AuthorizeRedirect, AuthorizeRequest, ClientRegistrationRequest,
    ClientRegistrationResponse, OAuthProvider, RevokeRequest, TokenRequest, TokenResponse,
};

const CODE_TTL_SECS: u64 = 120;
const TOKEN_TTL_SECS: u64 = 3600;

struct Client {
    secret: String,
    redirect_uris: Vec<String>,
}

struct AuthorizationCode {
    client_id: String,
    redirect_uri: String,
    expires_at: u64,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: u64,
}

pub struct InMemoryOAuthProvider {
    issuer: String,
    signing_key: Vec<u8>,
    clients: Mutex<HashMap<String, Client>>,
    codes: Mutex<HashMap<String, AuthorizationCode>>,
    revoked: Mutex<std::collections::HashSet<String>>,
}

impl InMemoryOAuthProvider {
    pub fn new(issuer: impl Into<String>, signing_key: impl Into<Vec<u8>>) -> Self {
        Self {
            issuer: issuer.into(),
            signing_key: signing_key.into(),
            clients: Mutex::new(HashMap::new()),
            codes: Mutex::new(HashMap::new()),
            revoked: Mutex::new(std::collections::HashSet::new()),
        }
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

#[async_trait]
impl OAuthProvider for InMemoryOAuthProvider {
    async fn authorize_page(&self, request: &AuthorizeRequest) -> Result<String, OAuthError> {
        if request.response_type != "code" {
            return Err(OAuthError::InvalidRequest(format!(
                "unsupported response_type: {}",
                request.response_type
            )));
        }
        Ok(format!(
            "<html><body><h1>Authorize {}</h1><form method=\"post\"><button type=\"submit\">Allow</button></form></body></html>",
            request.client_id
        ))
    }

    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeRedirect, OAuthError> {
        let clients = self.clients.lock().unwrap();
        let client = clients
            .get(&request.client_id)
            .ok_or_else(|| OAuthError::InvalidClient(request.client_id.clone()))?;
        if !client.redirect_uris.contains(&request.redirect_uri) {
            return Err(OAuthError::InvalidRequest("redirect_uri mismatch".to_string()));
        }
        drop(clients);

        let code = Uuid::new_v4().to_string();
        self.codes.lock().unwrap().insert(
            code.clone(),
            AuthorizationCode {
                client_id: request.client_id,
                redirect_uri: request.redirect_uri.clone(),
                expires_at: Self::now() + CODE_TTL_SECS,
            },
        );
        Ok(AuthorizeRedirect {
            redirect_uri: request.redirect_uri,
            code,
            state: request.state,
        })
    }

    async fn token(&self, request: TokenRequest) -> Result<TokenResponse, OAuthError> {
        if request.grant_type != "authorization_code" {
            return Err(OAuthError::UnsupportedGrantType(request.grant_type));
        }
        let code = request
            .code
            .ok_or_else(|| OAuthError::InvalidRequest("missing code".to_string()))?;
        let client_id = request
            .client_id
            .ok_or_else(|| OAuthError::InvalidRequest("missing client_id".to_string()))?;

        let mut codes = self.codes.lock().unwrap();
        let issued = codes
            .remove(&code)
            .ok_or_else(|| OAuthError::InvalidGrant("unknown or expired code".to_string()))?;
        drop(codes);

        if issued.client_id != client_id || issued.expires_at < Self::now() {
            return Err(OAuthError::InvalidGrant("code expired or client mismatch".to_string()));
        }
        let _ = issued.redirect_uri;

        let claims = Claims {
            sub: client_id,
            exp: Self::now() + TOKEN_TTL_SECS,
        };
        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| OAuthError::Internal(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: TOKEN_TTL_SECS,
            refresh_token: None,
            scope: None,
        })
    }

    async fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuthError> {
        if request.redirect_uris.is_empty() {
            return Err(OAuthError::InvalidRequest("redirect_uris must not be empty".to_string()));
        }
        let client_id = Uuid::new_v4().to_string();
        let client_secret = Uuid::new_v4().to_string();
        self.clients.lock().unwrap().insert(
            client_id.clone(),
            Client {
                secret: client_secret.clone(),
                redirect_uris: request.redirect_uris.clone(),
            },
        );
        Ok(ClientRegistrationResponse {
            client_id,
            client_secret,
            redirect_uris: request.redirect_uris,
        })
    }

    async fn revoke(&self, request: RevokeRequest) -> Result<(), OAuthError> {
        self.revoked.lock().unwrap().insert(request.token);
        Ok(())
    }

    fn metadata(&self) -> AuthorizationServerMetadata {
        AuthorizationServerMetadata {
            issuer: self.issuer.clone(),
            authorization_endpoint: format!("{}/authorize", self.issuer),
            token_endpoint: format!("{}/token", self.issuer),
            registration_endpoint: format!("{}/register", self.issuer),
            revocation_endpoint: format!("{}/revoke", self.issuer),
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: vec!["authorization_code".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> InMemoryOAuthProvider {
        InMemoryOAuthProvider::new("https://gateway.test", b"test-signing-key".to_vec())
    }

    #[tokio::test]
    async fn full_authorization_code_round_trip_issues_a_token() {
        let provider = provider();
        let client = provider
            .register_client(ClientRegistrationRequest {
                client_name: Some("demo".to_string()),
                redirect_uris: vec!["https://client.test/cb".to_string()],
            })
            .await
            .unwrap();

        let redirect = provider
            .authorize(AuthorizeRequest {
                response_type: "code".to_string(),
                client_id: client.client_id.clone(),
                redirect_uri: "https://client.test/cb".to_string(),
                scope: None,
                state: Some("xyz".to_string()),
                code_challenge: None,
                code_challenge_method: None,
            })
            .await
            .unwrap();
        assert_eq!(redirect.state.as_deref(), Some("xyz"));

        let token = provider
            .token(TokenRequest {
                grant_type: "authorization_code".to_string(),
                code: Some(redirect.code),
                redirect_uri: Some("https://client.test/cb".to_string()),
                client_id: Some(client.client_id),
                client_secret: Some(client.client_secret),
                refresh_token: None,
                code_verifier: None,
            })
            .await
            .unwrap();
        assert_eq!(token.token_type, "Bearer");
    }

    #[tokio::test]
    async fn reusing_an_authorization_code_fails() {
        let provider = provider();
        let client = provider
            .register_client(ClientRegistrationRequest {
                client_name: None,
                redirect_uris: vec!["https://client.test/cb".to_string()],
            })
            .await
            .unwrap();
        let redirect = provider
            .authorize(AuthorizeRequest {
                response_type: "code".to_string(),
                client_id: client.client_id.clone(),
                redirect_uri: "https://client.test/cb".to_string(),
                scope: None,
                state: None,
                code_challenge: None,
                code_challenge_method: None,
            })
            .await
            .unwrap();

        let request = TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some(redirect.code),
            redirect_uri: Some("https://client.test/cb".to_string()),
            client_id: Some(client.client_id),
            client_secret: Some(client.client_secret),
            refresh_token: None,
            code_verifier: None,
        };
        assert!(provider.token(request.clone()).await.is_ok());
        assert!(provider.token(request).await.is_err());
    }

    #[tokio::test]
    async fn unsupported_grant_type_is_rejected() {
        let provider = provider();
        let err = provider
            .token(TokenRequest {
                grant_type: "client_credentials".to_string(),
                code: None,
                redirect_uri: None,
                client_id: None,
                client_secret: None,
                refresh_token: None,
                code_verifier: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "unsupported_grant_type");
    }
}
