//! Response envelope unwrapping
//!
//! Successful responses arrive as `{ "success": bool, "data": <payload> }`.
//! Callers only ever see the payload.

use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Extract the payload from a successful response
///
/// Returns `None` for `204`, `content-length: 0`, an empty body, or a body
/// that is not an envelope (no `success` key). An envelope without a `data`
/// field yields `Some(Value::Null)`.
pub fn unwrap_envelope(
    status: StatusCode,
    content_length: Option<u64>,
    body: &[u8],
) -> Result<Option<Value>> {
    if status == StatusCode::NO_CONTENT || content_length == Some(0) || body.is_empty() {
        return Ok(None);
    }

    let parsed: Value = serde_json::from_slice(body).map_err(|e| ApiError::decode(e.to_string()))?;

    match parsed {
        Value::Object(mut map) if map.contains_key("success") => {
            Ok(Some(map.remove("data").unwrap_or(Value::Null)))
        }
        _ => Ok(None),
    }
}

/// Parse a non-2xx body for error diagnostics, keeping plain text as a string
pub fn error_body(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice(body)
        .ok()
        .or_else(|| Some(Value::String(String::from_utf8_lossy(body).into_owned())))
}
