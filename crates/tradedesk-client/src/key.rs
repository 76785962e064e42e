//! Request URL and cache key derivation
//!
//! A cache key is the fully rendered request URL. Query parameters are
//! collected into a sorted map after null and empty-string values are
//! dropped, so `{b: 1, a: 2}` and `{a: 2, b: 1}` render identically.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::Url;

use crate::error::Result;

/// Query parameters after stripping, in canonical (sorted) order
pub type QueryParams = BTreeMap<String, String>;

/// Ensure an endpoint starts with a single `/`
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    }
}

/// Drop null and empty-string values and render the rest as query strings
pub fn strip_params(params: &Map<String, Value>) -> QueryParams {
    params
        .iter()
        .filter_map(|(key, value)| render_value(value).map(|v| (key.clone(), v)))
        .collect()
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Build the request URL for `endpoint` under `base_url`
pub fn build_url(base_url: &str, endpoint: &str, params: &QueryParams) -> Result<Url> {
    let mut url = Url::parse(&format!(
        "{}{}",
        base_url.trim_end_matches('/'),
        normalize_endpoint(endpoint)
    ))?;

    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Derive the resource path a write invalidates: the first two `/`-delimited segments
///
/// `/users/123` yields `/users`, `/sales/orders/9` yields `/sales`.
pub fn resource_path(endpoint: &str) -> String {
    let endpoint = normalize_endpoint(endpoint);
    let path = endpoint.split(['?', '#']).next().unwrap_or_default();
    path.split('/').take(2).collect::<Vec<_>>().join("/")
}
