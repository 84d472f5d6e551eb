//! OAuth2 endpoint surface: `authorize`/`token`/`register`/`revoke` and the
//! authorization-server metadata document. The gateway never implements
//! OAuth2 semantics itself — every method here delegates to an injected
//! [`OAuthProvider`], and this crate's own job is limited to moving bytes
//! between HTTP and that trait.

pub mod error;
pub mod in_memory;
pub mod provider;
pub mod router;

pub use error::OAuthError;
pub use in_memory::InMemoryOAuthProvider;
pub use provider::{
    AuthorizationServerMetadata, AuthorizeRedirect, AuthorizeRequest, ClientRegistrationRequest,
    ClientRegistrationResponse, OAuthProvider, RevokeRequest, TokenRequest, TokenResponse,
};
pub use router::route;
