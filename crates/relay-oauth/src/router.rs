//! The thin HTTP shell around an [`OAuthProvider`]: decode the request,
//! call the provider, encode its answer. No OAuth semantics live here.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use hyper::header::{CONTENT_TYPE, LOCATION};
use hyper::{Method, Request, Response, StatusCode};
use relay_http_front::body::{self, FrontBody};
use url::form_urlencoded;

use crate::error::OAuthError;
use crate::provider::{AuthorizeRequest, ClientRegistrationRequest, RevokeRequest, TokenRequest};
use crate::OAuthProvider;

fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<FrontBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(body::full(serde_json::to_vec(value).unwrap_or_default()))
        .unwrap()
}

fn html_response(body_html: String) -> Response<FrontBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html")
        .body(body::full(body_html))
        .unwrap()
}

fn error_response(error: OAuthError) -> Response<FrontBody> {
    json_response(
        error.http_status(),
        &serde_json::json!({"error": error.error_code(), "error_description": error.to_string()}),
    )
}

async fn read_body(req: Request<hyper::body::Incoming>) -> Result<Bytes, Response<FrontBody>> {
    use http_body_util::BodyExt;
    req.into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|_| {
            Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(body::full("failed to read request body"))
                .unwrap()
        })
}

fn form_or_query<'a>(uri: &'a hyper::Uri, body: &'a [u8], content_type: &str) -> Vec<(String, String)> {
    if content_type.starts_with("application/x-www-form-urlencoded") {
        form_urlencoded::parse(body).into_owned().collect()
    } else {
        uri.query()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default()
    }
}

/// Routes the six OAuth2 endpoints named in the gateway's external
/// interface onto `provider`. Expected to be mounted at the gateway root
/// alongside the per-prefix MCP surface, since these endpoints are shared
/// across tenants rather than scoped to one.
pub async fn route(
    req: Request<hyper::body::Incoming>,
    provider: Arc<dyn OAuthProvider>,
) -> Result<Response<FrontBody>, Infallible> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let response = match (path.as_str(), method) {
        ("/authorize", Method::GET) => handle_authorize_page(provider, req).await,
        ("/authorize", Method::POST) => handle_authorize(provider, req).await,
        ("/token", Method::POST) => handle_token(provider, req).await,
        ("/register", Method::POST) => handle_register(provider, req).await,
        ("/revoke", Method::POST) => handle_revoke(provider, req).await,
        ("/.well-known/oauth-authorization-server", Method::GET) => {
            json_response(StatusCode::OK, &serde_json::to_value(provider.metadata()).unwrap())
        }
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(body::full("Not Found"))
            .unwrap(),
    };
    Ok(response)
}

fn parse_authorize(pairs: &[(String, String)]) -> Result<AuthorizeRequest, OAuthError> {
    let get = |key: &str| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
    Ok(AuthorizeRequest {
        response_type: get("response_type").ok_or_else(|| OAuthError::InvalidRequest("missing response_type".into()))?,
        client_id: get("client_id").ok_or_else(|| OAuthError::InvalidRequest("missing client_id".into()))?,
        redirect_uri: get("redirect_uri").ok_or_else(|| OAuthError::InvalidRequest("missing redirect_uri".into()))?,
        scope: get("scope"),
        state: get("state"),
        code_challenge: get("code_challenge"),
        code_challenge_method: get("code_challenge_method"),
    })
}

async fn handle_authorize_page(provider: Arc<dyn OAuthProvider>, req: Request<hyper::body::Incoming>) -> Response<FrontBody> {
    let uri = req.uri().clone();
    let pairs: Vec<(String, String)> = uri
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    match parse_authorize(&pairs) {
        Ok(request) => match provider.authorize_page(&request).await {
            Ok(html) => html_response(html),
            Err(e) => error_response(e),
        },
        Err(e) => error_response(e),
    }
}

async fn handle_authorize(provider: Arc<dyn OAuthProvider>, req: Request<hyper::body::Incoming>) -> Response<FrontBody> {
    let uri = req.uri().clone();
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = match read_body(req).await {
        Ok(b) => b,
        Err(response) => return response,
    };
    let pairs = form_or_query(&uri, &body, &content_type);
    let request = match parse_authorize(&pairs) {
        Ok(r) => r,
        Err(e) => return error_response(e),
    };
    match provider.authorize(request).await {
        Ok(redirect) => {
            let location = match &redirect.state {
                Some(state) => format!("{}?code={}&state={}", redirect.redirect_uri, redirect.code, state),
                None => format!("{}?code={}", redirect.redirect_uri, redirect.code),
            };
            Response::builder()
                .status(StatusCode::FOUND)
                .header(LOCATION, location)
                .body(body::full(Bytes::new()))
                .unwrap()
        }
        Err(e) => error_response(e),
    }
}

async fn handle_token(provider: Arc<dyn OAuthProvider>, req: Request<hyper::body::Incoming>) -> Response<FrontBody> {
    let uri = req.uri().clone();
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = match read_body(req).await {
        Ok(b) => b,
        Err(response) => return response,
    };
    let pairs = form_or_query(&uri, &body, &content_type);
    let get = |key: &str| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
    let request = TokenRequest {
        grant_type: get("grant_type").unwrap_or_default(),
        code: get("code"),
        redirect_uri: get("redirect_uri"),
        client_id: get("client_id"),
        client_secret: get("client_secret"),
        refresh_token: get("refresh_token"),
        code_verifier: get("code_verifier"),
    };
    match provider.token(request).await {
        Ok(token) => json_response(StatusCode::OK, &serde_json::to_value(token).unwrap()),
        Err(e) => error_response(e),
    }
}

async fn handle_register(provider: Arc<dyn OAuthProvider>, req: Request<hyper::body::Incoming>) -> Response<FrontBody> {
    let body = match read_body(req).await {
        Ok(b) => b,
        Err(response) => return response,
    };
    let request: ClientRegistrationRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(OAuthError::InvalidRequest(e.to_string())),
    };
    match provider.register_client(request).await {
        Ok(registered) => json_response(StatusCode::CREATED, &serde_json::to_value(registered).unwrap()),
        Err(e) => error_response(e),
    }
}

async fn handle_revoke(provider: Arc<dyn OAuthProvider>, req: Request<hyper::body::Incoming>) -> Response<FrontBody> {
    let uri = req.uri().clone();
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = match read_body(req).await {
        Ok(b) => b,
        Err(response) => return response,
    };
    let pairs = form_or_query(&uri, &body, &content_type);
    let get = |key: &str| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
    let Some(token) = get("token") else {
        return error_response(OAuthError::InvalidRequest("missing token".to_string()));
    };
    let request = RevokeRequest {
        token,
        token_type_hint: get("token_type_hint"),
    };
    match provider.revoke(request).await {
        Ok(()) => Response::builder().status(StatusCode::OK).body(body::full(Bytes::new())).unwrap(),
        Err(e) => error_response(e),
    }
}
