//! HTTP transport construction
//!
//! Builds the pooled `reqwest::Client` every [`ApiClient`](crate::ApiClient)
//! sends through. Request timeouts are not configured here: the client
//! bounds each exchange itself so a timeout always classifies as 408.

use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// User agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("tradedesk-client/", env!("CARGO_PKG_VERSION"));

/// HTTP client configuration with connection tuning options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Enable `TCP_NODELAY` (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// TCP keep-alive duration
    pub tcp_keepalive: Option<Duration>,

    /// Enable compression (gzip, brotli, deflate)
    pub enable_compression: bool,

    /// User-Agent header value
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 10,
            connect_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
            tcp_keepalive: Some(Duration::from_secs(60)),
            enable_compression: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl TransportConfig {
    /// Settings for a low-traffic client, such as the admin console
    pub fn minimal() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(15),
            pool_max_idle_per_host: 2,
            tcp_keepalive: None,
            enable_compression: false,
            ..Self::default()
        }
    }

    /// Build a `reqwest::Client` from this configuration
    pub fn build_client(&self) -> Result<Client, ConfigError> {
        let mut builder = ClientBuilder::new()
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .connect_timeout(self.connect_timeout)
            .tcp_nodelay(self.tcp_nodelay)
            .tcp_keepalive(self.tcp_keepalive)
            .user_agent(self.user_agent.clone())
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::limited(3));

        if self.enable_compression {
            builder = builder.gzip(true).brotli(true).deflate(true);
        }

        Ok(builder.build()?)
    }
}
