//! Error types for API client operations
//!
//! Every failure the client can produce is an [`ApiError`]. Whatever the
//! variant, callers can read it through the uniform `{status, statusText, data}`
//! shape via [`ApiError::status`], [`ApiError::status_text`],
//! [`ApiError::data`] and [`ApiError::body`].

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Which side of the exchange failed schema validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStage {
    /// Params or body rejected before any network I/O
    Request,
    /// Response body rejected after the network call
    Response,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {status_text}")]
    Http {
        status: u16,
        status_text: String,
        data: Option<Value>,
    },

    #[error("{stage:?} validation failed: {error}")]
    Validation {
        stage: ValidationStage,
        received: Value,
        error: String,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid response body: {message}")]
    Decode { message: String },

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl ApiError {
    /// Create a network error from any displayable cause
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an HTTP error for a non-2xx response
    pub fn http(status: StatusCode, data: Option<Value>) -> Self {
        Self::Http {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            data,
        }
    }

    /// Create a validation error
    pub fn validation(stage: ValidationStage, received: Value, error: impl Into<String>) -> Self {
        Self::Validation {
            stage,
            received,
            error: error.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Status code in the uniform error shape (0 when no response was received)
    pub fn status(&self) -> u16 {
        match self {
            Self::Timeout => 408,
            Self::Http { status, .. } => *status,
            Self::Validation { .. } => 422,
            Self::Network { .. } | Self::InvalidUrl(_) | Self::Decode { .. } | Self::Unknown { .. } => 0,
        }
    }

    pub fn status_text(&self) -> &str {
        match self {
            Self::Network { .. } => "Network Error",
            Self::Timeout => "Request Timeout",
            Self::Http { status_text, .. } => status_text,
            Self::Validation {
                stage: ValidationStage::Request,
                ..
            } => "Request Validation Failed",
            Self::Validation {
                stage: ValidationStage::Response,
                ..
            } => "Response Validation Failed",
            Self::InvalidUrl(_) => "Invalid URL",
            Self::Decode { .. } => "Invalid Response Body",
            Self::Unknown { .. } => "Unknown Error",
        }
    }

    /// Diagnostic payload: the server's error body, or `{received, error}` for validation
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::Http { data, .. } => data.clone(),
            Self::Validation {
                received, error, ..
            } => Some(json!({ "received": received, "error": error })),
            _ => None,
        }
    }

    /// Render the uniform `{status, statusText, data?}` shape
    pub fn body(&self) -> ApiErrorBody {
        ApiErrorBody {
            status: self.status(),
            status_text: self.status_text().to_string(),
            data: self.data(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Http { status, .. } if (400..500).contains(status))
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Http { status, .. } if *status >= 500)
    }

    /// Whether the caller may reasonably try the call again
    ///
    /// The client never retries on its own; this is only a hint.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout => true,
            Self::Http { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::network(e.to_string())
        }
    }
}

/// Serializable form of an [`ApiError`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub status: u16,
    pub status_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Errors raised while building a client from configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid base URL {url}: {source}")]
    BaseUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("HTTP client construction failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;
