//! Configuration structures for API clients

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::transport::TransportConfig;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default TTL for cached GET responses
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Delay between polls while another call holds the in-flight lock
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Polls before a waiter gives up and fetches on its own (~30s at the default interval)
pub const DEFAULT_MAX_LOCK_WAITS: u32 = 600;

/// Hash attempts allowed when searching for a nonce
pub const DEFAULT_NONCE_MAX_ATTEMPTS: u32 = 1000;

/// How a successful write selects the cached reads it invalidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidationMode {
    /// Drop every key containing the resource path as a raw substring.
    /// `/users` also clears `/users-preferences`.
    #[default]
    Substring,
    /// Drop entries whose path is the resource path or lies beneath it
    SegmentPrefix,
}

impl std::str::FromStr for InvalidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "substring" => Ok(Self::Substring),
            "segment-prefix" => Ok(Self::SegmentPrefix),
            other => Err(format!("unknown invalidation mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every endpoint is resolved against
    pub base_url: String,

    /// Upper bound for one network exchange (send + body read)
    pub timeout: Duration,

    /// Cache GET responses
    pub cache_enabled: bool,

    /// TTL applied to every cached GET response
    pub cache_ttl: Duration,

    /// Delay between cache lookups while waiting on an in-flight GET
    pub lock_poll_interval: Duration,

    /// Maximum number of polls before a waiter fetches on its own
    pub max_lock_waits: u32,

    /// Attempt budget for the nonce search
    pub nonce_max_attempts: u32,

    /// Cache invalidation strategy for writes
    pub invalidation: InvalidationMode,

    /// Forward classified errors to the error reporter.
    /// Defaults to on in debug builds and off in release builds.
    pub report_errors: bool,

    /// Connection pool and TLS settings for the underlying HTTP client
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout: DEFAULT_TIMEOUT,
            cache_enabled: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            max_lock_waits: DEFAULT_MAX_LOCK_WAITS,
            nonce_max_attempts: DEFAULT_NONCE_MAX_ATTEMPTS,
            invalidation: InvalidationMode::default(),
            report_errors: cfg!(debug_assertions),
            transport: TransportConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for `base_url` with default settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_invalidation(mut self, mode: InvalidationMode) -> Self {
        self.invalidation = mode;
        self
    }

    pub fn with_report_errors(mut self, report: bool) -> Self {
        self.report_errors = report;
        self
    }

    /// Create configuration from `TRADEDESK_*` environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |name: &str, default: Duration| {
            lookup(name)
                .and_then(|s| s.parse::<u64>().ok())
                .map_or(default, Duration::from_millis)
        };

        let invalidation = match lookup("TRADEDESK_INVALIDATION") {
            Some(mode) => mode.parse().map_err(|reason| ConfigError::Invalid {
                field: "invalidation",
                reason,
            })?,
            None => defaults.invalidation,
        };

        let config = Self {
            base_url: lookup("TRADEDESK_BASE_URL").unwrap_or(defaults.base_url),
            timeout: millis("TRADEDESK_TIMEOUT_MS", defaults.timeout),
            cache_enabled: lookup("TRADEDESK_CACHE_ENABLED")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cache_enabled),
            cache_ttl: millis("TRADEDESK_CACHE_TTL_MS", defaults.cache_ttl),
            lock_poll_interval: millis("TRADEDESK_LOCK_POLL_MS", defaults.lock_poll_interval),
            max_lock_waits: lookup("TRADEDESK_MAX_LOCK_WAITS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_lock_waits),
            nonce_max_attempts: lookup("TRADEDESK_NONCE_MAX_ATTEMPTS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.nonce_max_attempts),
            invalidation,
            report_errors: lookup("TRADEDESK_REPORT_ERRORS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.report_errors),
            transport: defaults.transport,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can produce a working client
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.base_url).map_err(|source| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            source,
        })?;

        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "timeout",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.lock_poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "lock_poll_interval",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert!(config.cache_enabled);
        assert_eq!(config.nonce_max_attempts, 1000);
        assert_eq!(config.invalidation, InvalidationMode::Substring);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_default_values() {
        let config = ClientConfig::from_lookup(|_| None).expect("Defaults should be valid");
        assert_eq!(config.base_url, ClientConfig::default().base_url);
        assert_eq!(config.max_lock_waits, DEFAULT_MAX_LOCK_WAITS);
    }

    #[test]
    fn test_from_lookup_custom_values() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("TRADEDESK_BASE_URL", "https://admin.example.com/api"),
            ("TRADEDESK_TIMEOUT_MS", "5000"),
            ("TRADEDESK_CACHE_ENABLED", "false"),
            ("TRADEDESK_CACHE_TTL_MS", "120000"),
            ("TRADEDESK_INVALIDATION", "segment-prefix"),
            ("TRADEDESK_REPORT_ERRORS", "true"),
        ]))
        .expect("Custom values should be valid");

        assert_eq!(config.base_url, "https://admin.example.com/api");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_ttl, Duration::from_secs(120));
        assert_eq!(config.invalidation, InvalidationMode::SegmentPrefix);
        assert!(config.report_errors);
    }

    #[test]
    fn test_from_lookup_ignores_unparsable_numbers() {
        let config = ClientConfig::from_lookup(lookup_from(&[("TRADEDESK_TIMEOUT_MS", "soon")]))
            .expect("Fallback should apply");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_unknown_invalidation_mode_rejected() {
        let result = ClientConfig::from_lookup(lookup_from(&[("TRADEDESK_INVALIDATION", "exact")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "invalidation",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let config = ClientConfig::new("not a url");
        assert!(matches!(config.validate(), Err(ConfigError::BaseUrl { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ClientConfig::new("http://localhost").with_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "timeout", .. })
        ));
    }
}
