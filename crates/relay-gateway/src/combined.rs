//! Mounts the OAuth2 surface (gateway-wide, unprefixed) alongside the
//! per-tenant MCP surface on the same listener.

use std::convert::Infallible;
use std::sync::Arc;

use hyper::{Request, Response};
use relay_http_front::body::FrontBody;
use relay_http_front::router::AppState;
use relay_oauth::OAuthProvider;

const OAUTH_PATHS: &[&str] = &[
    "/authorize",
    "/token",
    "/register",
    "/revoke",
    "/.well-known/oauth-authorization-server",
];

pub async fn route(
    req: Request<hyper::body::Incoming>,
    app: Arc<AppState>,
    oauth: Arc<dyn OAuthProvider>,
) -> Result<Response<FrontBody>, Infallible> {
    if OAUTH_PATHS.contains(&req.uri().path()) {
        return relay_oauth::route(req, oauth).await;
    }
    relay_http_front::route(req, app).await
}
