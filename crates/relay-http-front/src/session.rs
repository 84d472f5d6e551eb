//! Builds the `RequestInfo` a session's tool calls template against from
//! the HTTP request that opened it, and small query/cookie parsing shared
//! by the SSE and streamable endpoints.

use std::collections::HashMap;

use hyper::{HeaderMap, Uri};
use relay_session_store::RequestInfo;

pub fn parse_query(uri: &Uri) -> HashMap<String, String> {
    uri.query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let Some(raw) = headers.get(hyper::header::COOKIE).and_then(|v| v.to_str().ok()) else {
        return HashMap::new();
    };
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn request_info(headers: &HeaderMap, uri: &Uri) -> RequestInfo {
    let headers_map = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    RequestInfo {
        headers: headers_map,
        query: parse_query(uri),
        cookies: parse_cookies(headers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_collects_pairs() {
        let uri: Uri = "/x/message?sessionId=abc&foo=bar".parse().unwrap();
        let query = parse_query(&uri);
        assert_eq!(query.get("sessionId").map(String::as_str), Some("abc"));
        assert_eq!(query.get("foo").map(String::as_str), Some("bar"));
    }

    #[test]
    fn parse_cookies_splits_on_semicolon() {
        let mut headers = HeaderMap::new();
        headers.insert(hyper::header::COOKIE, "a=1; b=2".parse().unwrap());
        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
        assert_eq!(cookies.get("b").map(String::as_str), Some("2"));
    }
}
