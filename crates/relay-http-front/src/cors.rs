//! CORS header application, one preset per endpoint's allowed method set.

use hyper::HeaderMap;

pub struct CorsLayer;

impl CorsLayer {
    pub fn apply(headers: &mut HeaderMap, allow_methods: &str) {
        headers.insert("Access-Control-Allow-Origin", "*".parse().unwrap());
        headers.insert("Access-Control-Allow-Methods", allow_methods.parse().unwrap());
        headers.insert(
            "Access-Control-Allow-Headers",
            "Content-Type, Accept, Authorization, Mcp-Session-Id".parse().unwrap(),
        );
        headers.insert("Access-Control-Max-Age", "86400".parse().unwrap());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_sets_the_requested_method_list() {
        let mut headers = HeaderMap::new();
        CorsLayer::apply(&mut headers, "GET, POST, DELETE");
        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "*");
        assert_eq!(
            headers.get("Access-Control-Allow-Methods").unwrap(),
            "GET, POST, DELETE"
        );
    }
}
