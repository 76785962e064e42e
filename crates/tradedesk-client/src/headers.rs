//! Outbound header construction

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::auth::{RequestContext, Tenant};
use crate::nonce::NonceHeaders;

pub const X_ADMIN_KEY: HeaderName = HeaderName::from_static("x-admin-key");
pub const X_CLIENT_CODE: HeaderName = HeaderName::from_static("x-client-code");
pub const X_CACHE_CONTROL: HeaderName = HeaderName::from_static("x-cache-control");
pub const X_REQUEST_KEY: HeaderName = HeaderName::from_static("x-request-key");
pub const X_TIMESTAMP: HeaderName = HeaderName::from_static("x-timestamp");
pub const X_NONCE: HeaderName = HeaderName::from_static("x-nonce");

const NO_CACHE: HeaderValue = HeaderValue::from_static("no-cache");
const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!("Dropping header {} with a non-visible-ASCII value", name),
    }
}

/// Assemble every header for one request
///
/// `extra` headers are applied last and replace computed ones with the same
/// name, except that a caller-supplied `Content-Type` is kept as is.
pub fn build_headers(
    method: &Method,
    ctx: &RequestContext,
    has_body: bool,
    nonce: &NonceHeaders,
    extra: &HeaderMap,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(token) = &ctx.access_token {
        insert_str(&mut headers, AUTHORIZATION, &format!("Bearer {token}"));
    }

    match &ctx.tenant {
        Some(Tenant::AdminKey(key)) => insert_str(&mut headers, X_ADMIN_KEY, key),
        Some(Tenant::ClientCode(code)) => insert_str(&mut headers, X_CLIENT_CODE, code),
        None => {}
    }

    if has_body && !extra.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, APPLICATION_JSON);
    }

    if method != Method::GET {
        headers.insert(X_CACHE_CONTROL, NO_CACHE);
    }

    insert_str(&mut headers, X_REQUEST_KEY, &nonce.request_key);
    insert_str(&mut headers, X_TIMESTAMP, &nonce.timestamp.to_string());
    if let Some(value) = &nonce.nonce {
        insert_str(&mut headers, X_NONCE, value);
    }

    for (name, value) in extra {
        headers.insert(name.clone(), value.clone());
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonce() -> NonceHeaders {
        NonceHeaders {
            request_key: "abc123".to_string(),
            timestamp: 42,
            nonce: Some("f00d".to_string()),
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::anonymous()
            .with_access_token("tok")
            .with_client_code("ACME")
    }

    #[test]
    fn test_get_headers() {
        let headers = build_headers(&Method::GET, &ctx(), false, &nonce(), &HeaderMap::new());
        assert_eq!(headers[AUTHORIZATION], "Bearer tok");
        assert_eq!(headers[X_CLIENT_CODE], "ACME");
        assert!(!headers.contains_key(X_ADMIN_KEY));
        assert!(!headers.contains_key(X_CACHE_CONTROL));
        assert!(!headers.contains_key(CONTENT_TYPE));
        assert_eq!(headers[X_REQUEST_KEY], "abc123");
        assert_eq!(headers[X_TIMESTAMP], "42");
        assert_eq!(headers[X_NONCE], "f00d");
    }

    #[test]
    fn test_admin_key_replaces_client_code() {
        let ctx = ctx().with_admin_key("root");
        let headers = build_headers(&Method::GET, &ctx, false, &nonce(), &HeaderMap::new());
        assert_eq!(headers[X_ADMIN_KEY], "root");
        assert!(!headers.contains_key(X_CLIENT_CODE));
    }

    #[test]
    fn test_write_headers() {
        let headers = build_headers(&Method::POST, &ctx(), true, &nonce(), &HeaderMap::new());
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[X_CACHE_CONTROL], "no-cache");
    }

    #[test]
    fn test_explicit_content_type_is_kept() {
        let mut extra = HeaderMap::new();
        extra.insert(CONTENT_TYPE, HeaderValue::from_static("application/merge-patch+json"));
        let headers = build_headers(&Method::PATCH, &ctx(), true, &nonce(), &extra);
        assert_eq!(headers[CONTENT_TYPE], "application/merge-patch+json");
    }

    #[test]
    fn test_missing_nonce_omits_header() {
        let mut nonce = nonce();
        nonce.nonce = None;
        let headers = build_headers(&Method::DELETE, &RequestContext::anonymous(), false, &nonce, &HeaderMap::new());
        assert!(!headers.contains_key(X_NONCE));
        assert!(!headers.contains_key(AUTHORIZATION));
        assert!(headers.contains_key(X_REQUEST_KEY));
        assert_eq!(headers[X_CACHE_CONTROL], "no-cache");
    }
}
